use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::core::session::SessionState;
use crate::core::state::{clear_session, load_session, save_active_section, save_session, StateBackend};
use crate::core::synth::{EventSynthesizer, TickReport};
use crate::core::Section;
use crate::modules::generator::{fetch_payloads, PayloadGenerator};
use crate::utils::payload_loader::PayloadSet;
use crate::{EngineSettings, ScanConfig, SinkRef};

/// Result of one scheduled tick.
#[derive(Debug)]
pub enum TickOutcome {
    Applied(TickReport),
    /// The tick belonged to a session that has since been replaced.
    Stale,
    /// The session is not running or already complete.
    Finished,
}

struct Inner {
    state: SessionState,
    synth: EventSynthesizer,
}

/// Drives the simulated scan.
///
/// The engine:
/// 1. Resets the session and enters the generating sub-state
/// 2. Resolves the payload set (custom list, generated, or fallback)
/// 3. Ticks on a fixed interval until progress reaches 100
/// 4. Mirrors the session to the state backend after every change
///
/// Every tick is stamped with the generation of the session it was scheduled
/// for and is discarded if a newer session has started in the meantime.
pub struct ScanEngine {
    inner: Mutex<Inner>,
    backend: Arc<dyn StateBackend>,
    generator: Option<Arc<dyn PayloadGenerator>>,
    payload_override: Option<PayloadSet>,
    settings: EngineSettings,
    sink: SinkRef,
}

impl ScanEngine {
    /// Creates an engine whose session is rehydrated from `backend`.
    pub fn new(backend: Arc<dyn StateBackend>, settings: EngineSettings, sink: SinkRef) -> Self {
        let state = load_session(backend.as_ref());
        Self {
            inner: Mutex::new(Inner {
                state,
                synth: EventSynthesizer::from_seed(settings.seed),
            }),
            backend,
            generator: None,
            payload_override: None,
            settings,
            sink,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn PayloadGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Uses a fixed payload set instead of calling the generator.
    pub fn with_payloads(mut self, payloads: PayloadSet) -> Self {
        self.payload_override = Some(payloads);
        self
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// Starts a new session and resolves its payloads. Ticking is left to
    /// `run_ticks`. Returns the new session's generation.
    pub async fn start_session(&self, config: ScanConfig) -> anyhow::Result<u64> {
        config.validate()?;

        let generation = {
            let mut inner = self.inner.lock().await;
            let generation = inner.state.start_session(config.clone());
            self.persist(&inner.state);
            generation
        };

        let payloads = match &self.payload_override {
            Some(set) => set.clone(),
            None => {
                self.sink.on_log("phase", &format!("[*] Generating payloads for {} ({})...", config.target, config.mode));
                fetch_payloads(self.generator.as_deref(), &config, self.settings.fetch_timeout).await
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.state.generation() != generation {
            info!("Discarding payloads for superseded session {}", generation);
            return Ok(generation);
        }

        self.sink.on_log("info", &format!("[*] Loaded {} payload(s) ({:?})", payloads.len(), payloads.origin()));
        inner.state.install_payloads(payloads);
        inner.state.begin_running();
        self.persist(&inner.state);
        Ok(generation)
    }

    /// Applies one tick if `generation` is still the current session.
    pub async fn tick_once(&self, generation: u64) -> TickOutcome {
        let mut inner = self.inner.lock().await;
        if inner.state.generation() != generation {
            debug!("Dropping tick for stale session {}", generation);
            return TickOutcome::Stale;
        }

        let Inner { state, synth } = &mut *inner;
        let Some(report) = synth.tick(state) else {
            return TickOutcome::Finished;
        };
        self.persist(state);

        self.sink.on_event(&report.event);
        if let Some(finding) = &report.finding {
            self.sink.on_finding(finding);
        }
        self.sink.on_progress(state.progress());

        TickOutcome::Applied(report)
    }

    /// Ticks on the configured interval until the session completes or is replaced.
    pub async fn run_ticks(&self, generation: u64) {
        let period = self.settings.tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.tick_once(generation).await {
                TickOutcome::Applied(report) if report.completed => {
                    self.sink.on_log("success", "[+] Scan complete.");
                    break;
                }
                TickOutcome::Applied(_) => {}
                TickOutcome::Stale => {
                    info!("Session {} superseded, stopping its ticker", generation);
                    break;
                }
                TickOutcome::Finished => break,
            }
        }
    }

    /// Starts a session and ticks it to completion.
    pub async fn run(&self, config: ScanConfig) -> anyhow::Result<u64> {
        let generation = self.start_session(config).await?;
        self.run_ticks(generation).await;
        Ok(generation)
    }

    /// Returns the generation to keep ticking if the rehydrated session was
    /// still running. Payloads are not persisted, so the fallback list is used.
    pub async fn resume(&self) -> Option<u64> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_tick() {
            return None;
        }
        let payloads = self.payload_override.clone().unwrap_or_default();
        inner.state.install_payloads(payloads);
        inner.state.set_active_section(Section::Scans);
        self.persist(&inner.state);
        info!("Resuming session at {}%", inner.state.progress());
        Some(inner.state.generation())
    }

    /// Records the section the operator is viewing. Only that record is
    /// written, and nothing is written while there is no session data.
    pub async fn set_active_section(&self, section: Section) {
        let mut inner = self.inner.lock().await;
        inner.state.set_active_section(section);
        if inner.state.is_empty() {
            return;
        }
        if let Err(e) = save_active_section(self.backend.as_ref(), section) {
            warn!("Failed to persist active section: {}", e);
        }
    }

    /// Drops all session data, in memory and in storage. Pending ticks of the
    /// previous session become stale.
    pub async fn reset(&self) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let generation = inner.state.generation().wrapping_add(1);
        inner.state = SessionState { generation, ..SessionState::default() };
        clear_session(self.backend.as_ref())
    }

    fn persist(&self, state: &SessionState) {
        if let Err(e) = save_session(self.backend.as_ref(), state) {
            warn!("Failed to persist session state: {}", e);
        }
    }
}
