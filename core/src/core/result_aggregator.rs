use serde::{Deserialize, Serialize};

use crate::core::session::SessionState;
use crate::core::synth::ANOMALOUS_STATUS;
use crate::core::{Severity, VulnCategory};
use crate::SinkRef;

/// One simulated request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: String,
    pub timestamp: String,
    pub url: String,
    pub payload: String,
    pub status: u16,
    pub method: String,
}

impl ScanEvent {
    pub fn is_anomalous(&self) -> bool {
        self.status == ANOMALOUS_STATUS
    }
}

/// A simulated vulnerability derived from an anomalous event. Never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub url: String,
    pub parameter: String,
    pub payload: String,
    #[serde(rename = "type")]
    pub category: VulnCategory,
    pub severity: Severity,
    pub response_snippet: String,
    pub fix_recommendation: String,
}

/// Share of logged responses per status class, as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusMix {
    pub success: f64,
    pub missing: f64,
    pub errors: f64,
}

/// Dashboard view over a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSummary {
    pub progress: u8,
    pub running: bool,
    pub total_requests: u64,
    pub total_endpoints: usize,
    pub findings: usize,
    pub critical: usize,
    pub sql_injection: usize,
    pub xss: usize,
    pub broken_auth: usize,
    pub other: usize,
    pub status_mix: StatusMix,
}

/// Summarizes, searches and reports collected findings.
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn summarize(state: &SessionState) -> SessionSummary {
        let findings = state.findings();
        let count = |cat: VulnCategory| findings.iter().filter(|f| f.category == cat).count();

        let sql_injection = count(VulnCategory::SqlInjection);
        let xss = count(VulnCategory::CrossSiteScripting);
        let broken_auth = count(VulnCategory::BrokenAuth);

        SessionSummary {
            progress: state.progress(),
            running: state.is_running(),
            total_requests: state.total_requests(),
            total_endpoints: state.total_endpoints(),
            findings: findings.len(),
            critical: findings.iter().filter(|f| f.severity == Severity::High).count(),
            sql_injection,
            xss,
            broken_auth,
            other: findings.len() - sql_injection - xss - broken_auth,
            status_mix: status_mix(state.logs()),
        }
    }

    /// Case-insensitive match over category and URL. An empty query matches everything.
    pub fn search<'a>(findings: &'a [Finding], query: &str) -> Vec<&'a Finding> {
        let needle = query.to_lowercase();
        findings
            .iter()
            .filter(|f| {
                f.category.to_string().to_lowercase().contains(&needle)
                    || f.url.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn report_summary(state: &SessionState, sink: &SinkRef) {
        let summary = Self::summarize(state);
        let findings = state.findings();

        if findings.is_empty() {
            sink.on_log("success", "[+] No vulnerabilities found.");
        } else {
            sink.on_log(
                "warn",
                &format!("[+] {} finding(s) discovered, {} high severity:", summary.findings, summary.critical),
            );
            for (i, f) in findings.iter().enumerate() {
                sink.on_log("error", &format!(
                    "  #{} [{}] {} → {} (param: {}, payload: {})",
                    i + 1, f.severity, f.category, f.url, f.parameter, f.payload
                ));
            }
        }
        sink.on_log("info", &format!(
            "[*] Requests: {} | Endpoints: {} | Responses: {:.1}% ok, {:.1}% missing, {:.1}% errors",
            summary.total_requests,
            summary.total_endpoints,
            summary.status_mix.success,
            summary.status_mix.missing,
            summary.status_mix.errors
        ));
    }
}

fn status_mix(logs: &[ScanEvent]) -> StatusMix {
    if logs.is_empty() {
        return StatusMix::default();
    }
    let total = logs.len() as f64;
    let pct = |n: usize| round1(n as f64 / total * 100.0);

    StatusMix {
        success: pct(logs.iter().filter(|l| l.status < 400).count()),
        missing: pct(logs.iter().filter(|l| (400..500).contains(&l.status)).count()),
        errors: pct(logs.iter().filter(|l| l.status >= 500).count()),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
