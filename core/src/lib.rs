pub mod core;
pub mod http;
pub mod modules;
pub mod reporting;
pub mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use crate::core::engine::{ScanEngine, TickOutcome};
pub use crate::core::result_aggregator::{Finding, ResultAggregator, ScanEvent, SessionSummary};
pub use crate::core::session::SessionState;
pub use crate::core::state::{FileBackend, MemoryBackend, StateBackend};
pub use crate::core::{ScanMode, Section, Severity, VulnCategory};
pub use crate::http::HttpClient;
pub use crate::modules::generator::{GeminiGenerator, PayloadGenerator};
pub use crate::utils::payload_loader::PayloadSet;

pub const MIN_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 10;

/// Payload categories the operator asked the generator to focus on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadToggles {
    pub sql: bool,
    pub xss: bool,
    pub long_string: bool,
    pub special_char: bool,
    /// Free-text seed passed to the generator.
    pub custom: String,
}

impl Default for PayloadToggles {
    fn default() -> Self {
        Self {
            sql: true,
            xss: true,
            long_string: false,
            special_char: false,
            custom: String::new(),
        }
    }
}

impl PayloadToggles {
    pub fn enabled_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.sql { labels.push("SQL injection"); }
        if self.xss { labels.push("cross-site scripting"); }
        if self.long_string { labels.push("buffer overflow / long strings"); }
        if self.special_char { labels.push("encoding obfuscation / special characters"); }
        labels
    }
}

/// Operator-supplied scan configuration. Replaced wholesale on each new scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    #[serde(alias = "targetUrl")]
    pub target: String,
    #[serde(alias = "scanType")]
    pub mode: ScanMode,
    pub depth: u8,
    pub payloads: PayloadToggles,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            mode: ScanMode::FullScan,
            depth: 3,
            payloads: PayloadToggles::default(),
        }
    }
}

impl ScanConfig {
    pub fn for_target(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target.trim().is_empty() {
            anyhow::bail!("target must not be empty");
        }
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&self.depth) {
            anyhow::bail!("depth must be between {} and {}, got {}", MIN_DEPTH, MAX_DEPTH, self.depth);
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}

/// Runtime knobs of the engine, separate from what the operator scans.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    pub model: String,
    pub api_key: Option<String>,
    pub proxy: Option<String>,
    pub seed: Option<u64>,
}

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(800),
            fetch_timeout: Duration::from_secs(8),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            proxy: None,
            seed: None,
        }
    }
}

impl EngineSettings {
    /// Picks up the API key from `GEMINI_API_KEY`, then `API_KEY`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self { api_key, ..Self::default() }
    }
}

/// Output abstraction for the scan pipeline.
pub trait ScanEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_event(&self, event: &ScanEvent);
    fn on_finding(&self, finding: &Finding);
    fn on_progress(&self, progress: u8);
}

pub type SinkRef = Arc<dyn ScanEventSink>;

/// Terminal output sink for CLI usage.
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    pub fn new_ref(verbose: bool) -> SinkRef {
        Arc::new(Self { verbose })
    }
}

impl ScanEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        use std::io::Write;
        let colored = match level {
            "success" => message.green().to_string(),
            "error"   => message.red().to_string(),
            "warn"    => message.yellow().to_string(),
            "phase"   => message.bright_cyan().bold().to_string(),
            _         => message.to_string(),
        };
        print!("{}\r\n", colored);
        std::io::stdout().flush().ok();
    }

    fn on_event(&self, event: &ScanEvent) {
        use colored::*;
        if !self.verbose {
            return;
        }
        let status = match event.status {
            s if s >= 500 => s.to_string().red(),
            s if s >= 400 => s.to_string().yellow(),
            s => s.to_string().green(),
        };
        print!(
            "{} {:<4} {} {} {}\r\n",
            event.timestamp.dimmed(),
            event.method,
            status,
            event.url,
            event.payload.bright_yellow()
        );
    }

    fn on_finding(&self, finding: &Finding) {
        use colored::*;
        use std::io::Write;
        let out = |text: &str| {
            print!("{}\r\n", text);
            std::io::stdout().flush().ok();
        };
        out(&format!(
            "\n{} {} detected! [{}]",
            "[+]".green().bold(),
            finding.category.to_string().red().bold(),
            finding.severity
        ));
        out(&format!("    Target:    {}", finding.url.white()));
        out(&format!("    Parameter: {}", finding.parameter.cyan()));
        out(&format!("    Payload:   {}", finding.payload.bright_yellow()));
        out(&"──────────────────────────────────────────".dimmed().to_string());
    }

    fn on_progress(&self, progress: u8) {
        use colored::*;
        if progress % 10 == 0 {
            print!("{}\r\n", format!("[*] Progress {}%", progress).bright_cyan());
        }
    }
}
