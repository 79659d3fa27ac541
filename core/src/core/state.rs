//! Session persistence.
//!
//! Each field of the session lives under its own key so that a missing or
//! corrupt record only resets that one field. Keys carry a version suffix;
//! changing a record shape means bumping the suffix, never migrating.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::result_aggregator::{Finding, ScanEvent};
use crate::core::session::{SessionState, MAX_PROGRESS};
use crate::core::Section;
use crate::ScanConfig;

pub const DEFAULT_STATE_DIR: &str = ".webfuzzer";

/// Stable storage keys.
pub mod keys {
    pub const LOGS: &str = "webfuzzer_logs_v3";
    pub const VULNS: &str = "webfuzzer_vulnerabilities_v3";
    pub const PROGRESS: &str = "webfuzzer_progress_v3";
    pub const CONFIG: &str = "webfuzzer_scanConfig_v3";
    pub const TOTAL_REQS: &str = "webfuzzer_totalRequests_v3";
    pub const TOTAL_ENDPOINTS: &str = "webfuzzer_totalEndpoints_v3";
    pub const SEEN_ENDPOINTS: &str = "webfuzzer_seenEndpoints_v3";
    pub const IS_SCANNING: &str = "webfuzzer_isScanning_v3";
    pub const ACTIVE_TAB: &str = "webfuzzer_activeTab_v3";

    pub const ALL: &[&str] = &[
        LOGS, VULNS, PROGRESS, CONFIG, TOTAL_REQS, TOTAL_ENDPOINTS, SEEN_ENDPOINTS, IS_SCANNING,
        ACTIVE_TAB,
    ];
}

/// Durable key-value storage holding opaque serialized records.
pub trait StateBackend: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StateBackend for FileBackend {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    /// Atomic write: serialize to .tmp, then rename over the real file.
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.records.lock().ok()?.get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

fn read_field<T: DeserializeOwned>(backend: &dyn StateBackend, key: &str) -> Option<T> {
    let raw = backend.read(key)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Discarding unreadable record '{}': {}", key, e);
            None
        }
    }
}

fn write_field<T: Serialize + ?Sized>(backend: &dyn StateBackend, key: &str, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(value)?;
    backend.write(key, &json)
}

/// Rehydrates a session. Each key is read independently and falls back to its
/// empty/zero default. The payload set is not persisted and starts as the
/// fallback list.
pub fn load_session(backend: &dyn StateBackend) -> SessionState {
    let logs: Vec<ScanEvent> = read_field(backend, keys::LOGS).unwrap_or_default();
    let findings: Vec<Finding> = read_field(backend, keys::VULNS).unwrap_or_default();
    let progress: u8 = read_field::<u8>(backend, keys::PROGRESS)
        .unwrap_or(0)
        .min(MAX_PROGRESS);
    let config: Option<ScanConfig> = read_field(backend, keys::CONFIG);
    let total_requests: u64 = read_field(backend, keys::TOTAL_REQS).unwrap_or(0);
    let running: bool = read_field(backend, keys::IS_SCANNING).unwrap_or(false);
    let active_section: Section = read_field(backend, keys::ACTIVE_TAB).unwrap_or_default();

    // The persisted seen set is authoritative; without it, replay the retained log.
    let seen_urls: BTreeSet<String> = match read_field::<BTreeSet<String>>(backend, keys::SEEN_ENDPOINTS) {
        Some(seen) => seen,
        None => logs.iter().map(|l| l.url.clone()).collect(),
    };

    debug!(
        "Loaded session: progress={} logs={} findings={} endpoints={}",
        progress,
        logs.len(),
        findings.len(),
        seen_urls.len()
    );

    SessionState {
        progress,
        running: running && progress < MAX_PROGRESS,
        total_requests,
        seen_urls,
        config,
        findings,
        logs,
        active_section,
        ..SessionState::default()
    }
}

/// Writes every record of the session. All keys are attempted; the first
/// failure is returned.
pub fn save_session(backend: &dyn StateBackend, state: &SessionState) -> anyhow::Result<()> {
    let mut results = vec![
        write_field(backend, keys::LOGS, state.logs()),
        write_field(backend, keys::VULNS, state.findings()),
        write_field(backend, keys::PROGRESS, &state.progress()),
        write_field(backend, keys::TOTAL_REQS, &state.total_requests()),
        write_field(backend, keys::TOTAL_ENDPOINTS, &state.total_endpoints()),
        write_field(backend, keys::SEEN_ENDPOINTS, &state.seen_urls),
        write_field(backend, keys::IS_SCANNING, &state.is_running()),
        write_field(backend, keys::ACTIVE_TAB, &state.active_section()),
    ];
    if let Some(config) = state.config() {
        results.push(write_field(backend, keys::CONFIG, config));
    }
    results.into_iter().collect()
}

/// Writes only the active section, leaving every other record untouched.
pub fn save_active_section(backend: &dyn StateBackend, section: Section) -> anyhow::Result<()> {
    write_field(backend, keys::ACTIVE_TAB, &section)
}

/// Removes every persisted record.
pub fn clear_session(backend: &dyn StateBackend) -> anyhow::Result<()> {
    for key in keys::ALL {
        backend.remove(key)?;
    }
    Ok(())
}
