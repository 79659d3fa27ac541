use std::collections::BTreeSet;

use log::info;

use crate::core::result_aggregator::{Finding, ScanEvent};
use crate::core::Section;
use crate::utils::payload_loader::PayloadSet;
use crate::ScanConfig;

/// Maximum number of events retained in the log; older entries are evicted first.
pub const LOG_CAPACITY: usize = 100;

pub const MAX_PROGRESS: u8 = 100;

/// Accumulated data of the current scan run.
///
/// Every field is owned by one session. `generation` is bumped each time a
/// session starts so that work scheduled for an older session can detect it
/// is stale and drop its effects.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) generation: u64,
    pub(crate) progress: u8,
    pub(crate) running: bool,
    pub(crate) generating: bool,
    pub(crate) total_requests: u64,
    pub(crate) seen_urls: BTreeSet<String>,
    pub(crate) config: Option<ScanConfig>,
    pub(crate) payloads: PayloadSet,
    pub(crate) findings: Vec<Finding>,
    pub(crate) logs: Vec<ScanEvent>,
    pub(crate) active_section: Section,
}

impl SessionState {
    /// Resets everything for a new scan and enters the generating sub-state.
    /// Returns the generation id of the new session.
    pub fn start_session(&mut self, config: ScanConfig) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        info!("Starting session {} against {} ({})", self.generation, config.target, config.mode);

        self.progress = 0;
        self.running = false;
        self.generating = true;
        self.total_requests = 0;
        self.seen_urls.clear();
        self.findings.clear();
        self.logs.clear();
        self.payloads = PayloadSet::fallback();
        self.config = Some(config);
        self.active_section = Section::Scans;
        self.generation
    }

    /// Replaces the active payload set wholesale.
    pub fn install_payloads(&mut self, payloads: PayloadSet) {
        self.payloads = payloads;
    }

    /// Leaves the generating sub-state and starts ticking unless already complete.
    pub fn begin_running(&mut self) {
        self.generating = false;
        self.running = self.progress < MAX_PROGRESS;
    }

    pub fn can_tick(&self) -> bool {
        self.running && self.progress < MAX_PROGRESS
    }

    /// Advances progress by one step. Returns true when this step completed the
    /// session, which also clears the running flag.
    pub fn advance_progress(&mut self) -> bool {
        self.progress = self.progress.saturating_add(1).min(MAX_PROGRESS);
        if self.progress >= MAX_PROGRESS {
            self.running = false;
            return true;
        }
        false
    }

    pub fn add_requests(&mut self, burst: u64) {
        self.total_requests = self.total_requests.saturating_add(burst);
    }

    /// Records a URL as seen. Returns true if it had not been seen this session.
    pub fn observe_url(&mut self, url: &str) -> bool {
        if self.seen_urls.contains(url) {
            return false;
        }
        self.seen_urls.insert(url.to_string())
    }

    /// Appends an event, dropping the oldest entries beyond `LOG_CAPACITY`.
    pub fn push_event(&mut self, event: ScanEvent) {
        self.logs.push(event);
        if self.logs.len() > LOG_CAPACITY {
            let excess = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(..excess);
        }
    }

    /// Findings are kept most-recent-first.
    pub fn prepend_finding(&mut self, finding: Finding) {
        self.findings.insert(0, finding);
    }

    pub fn set_active_section(&mut self, section: Section) {
        self.active_section = section;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn total_endpoints(&self) -> usize {
        self.seen_urls.len()
    }

    pub fn config(&self) -> Option<&ScanConfig> {
        self.config.as_ref()
    }

    pub fn payloads(&self) -> &PayloadSet {
        &self.payloads
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn logs(&self) -> &[ScanEvent] {
        &self.logs
    }

    pub fn active_section(&self) -> Section {
        self.active_section
    }

    /// True when no scan has ever produced data in this state.
    pub fn is_empty(&self) -> bool {
        self.config.is_none() && self.logs.is_empty() && self.findings.is_empty() && self.progress == 0
    }
}
