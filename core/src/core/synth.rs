use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::outcome::OutcomeTable;
use crate::core::result_aggregator::{Finding, ScanEvent};
use crate::core::session::SessionState;
use crate::core::{Severity, VulnCategory};

/// Synthetic status distribution: 88% 200, 8% 404, 4% 500.
pub static STATUS_TABLE: OutcomeTable<u16> = OutcomeTable::new(&[(0.88, 200), (0.96, 404), (1.0, 500)]);

/// Finding severity: 60% Medium, 40% High.
pub static SEVERITY_TABLE: OutcomeTable<Severity> =
    OutcomeTable::new(&[(0.6, Severity::Medium), (1.0, Severity::High)]);

/// Status that marks an exchange as anomalous.
pub const ANOMALOUS_STATUS: u16 = 500;

pub const PARAMETERS: &[&str] = &["id", "user", "query", "token", "redirect", "cmd"];

const METHODS: &[&str] = &["GET", "POST"];
const API_SEGMENT: &str = "v1";
const DEFAULT_TARGET: &str = "https://api.example.com";
const PATH_LEN: usize = 6;
const ID_LEN: usize = 10;
const SNIPPET_PAYLOAD_CHARS: usize = 15;
const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// What one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub event: ScanEvent,
    pub finding: Option<Finding>,
    pub burst: u64,
    pub new_endpoint: bool,
    pub completed: bool,
}

/// Produces synthetic exchanges from a single source of randomness.
pub struct EventSynthesizer<R: Rng = StdRng> {
    rng: R,
}

impl EventSynthesizer<StdRng> {
    /// Seeded synthesizers replay the same session for the same inputs.
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl<R: Rng> EventSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Runs one tick against `state`. Returns `None` without touching the
    /// state when the session is not running or already complete.
    pub fn tick(&mut self, state: &mut SessionState) -> Option<TickReport> {
        if !state.can_tick() {
            return None;
        }

        let completed = state.advance_progress();

        let burst = self.rng.random_range(2..=6u64);
        state.add_requests(burst);

        let payload = state.payloads().choose(&mut self.rng).to_string();
        let status = STATUS_TABLE.resolve(self.rng.random::<f64>());

        let target = state
            .config()
            .map(|c| c.target.trim_end_matches('/').to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET.to_string());
        let url = format!("{}/{}/{}", target, API_SEGMENT, self.token(PATH_LEN));
        let new_endpoint = state.observe_url(&url);

        let event = ScanEvent {
            id: self.token(ID_LEN),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            url,
            payload,
            status,
            method: self.pick(METHODS).to_string(),
        };
        state.push_event(event.clone());

        let finding = if event.is_anomalous() {
            let finding = self.derive_finding(state, &event);
            state.prepend_finding(finding.clone());
            Some(finding)
        } else {
            None
        };

        debug!(
            "tick progress={} status={} url={} burst={}",
            state.progress(), status, event.url, burst
        );

        Some(TickReport { event, finding, burst, new_endpoint, completed })
    }

    fn derive_finding(&mut self, state: &SessionState, event: &ScanEvent) -> Finding {
        let pinned = state.config().and_then(|c| VulnCategory::pinned_by(c.mode));
        let category = match pinned {
            Some(category) => category,
            None => *self.pick(&VulnCategory::GENERIC),
        };
        let severity = SEVERITY_TABLE.resolve(self.rng.random::<f64>());
        let parameter = self.pick(PARAMETERS).to_string();

        Finding {
            id: self.token(ID_LEN),
            url: event.url.clone(),
            parameter,
            payload: event.payload.clone(),
            category,
            severity,
            response_snippet: response_snippet(&event.payload),
            fix_recommendation: fix_recommendation(category),
        }
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.random_range(0..items.len())]
    }

    fn token(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| TOKEN_CHARS[self.rng.random_range(0..TOKEN_CHARS.len())] as char)
            .collect()
    }
}

pub fn response_snippet(payload: &str) -> String {
    let prefix: String = payload.chars().take(SNIPPET_PAYLOAD_CHARS).collect();
    format!(
        "HTTP/1.1 500 Internal Server Error\nServer: Security-Audit-Engine\n\n{{\"error\": \"Exploit sequence detected: {}...\"}}",
        prefix
    )
}

pub fn fix_recommendation(category: VulnCategory) -> String {
    format!("Immediate remediation required for {}. {}", category, category.remediation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::LOG_CAPACITY;
    use crate::core::ScanMode;
    use crate::ScanConfig;
    use std::collections::HashSet;

    fn running_state(mode: ScanMode) -> SessionState {
        let mut config = ScanConfig::for_target("https://shop.test");
        config.mode = mode;
        let mut state = SessionState::default();
        state.start_session(config);
        state.begin_running();
        state
    }

    #[test]
    fn test_status_table_thresholds() {
        assert_eq!(STATUS_TABLE.resolve(0.0), 200);
        assert_eq!(STATUS_TABLE.resolve(0.6), 200);
        assert_eq!(STATUS_TABLE.resolve(0.88), 200);
        assert_eq!(STATUS_TABLE.resolve(0.880_001), 404);
        assert_eq!(STATUS_TABLE.resolve(0.96), 404);
        assert_eq!(STATUS_TABLE.resolve(0.961), ANOMALOUS_STATUS);

        let weights = STATUS_TABLE.weights();
        let expected = [(200, 0.88), (404, 0.08), (500, 0.04)];
        assert_eq!(weights.len(), expected.len());
        for ((status, weight), (want_status, want_weight)) in weights.into_iter().zip(expected) {
            assert_eq!(status, want_status);
            assert!((weight - want_weight).abs() < 1e-9, "{} weighted {}", status, weight);
        }
    }

    #[test]
    fn test_severity_table_thresholds() {
        assert_eq!(SEVERITY_TABLE.resolve(0.0), Severity::Medium);
        assert_eq!(SEVERITY_TABLE.resolve(0.6), Severity::Medium);
        assert_eq!(SEVERITY_TABLE.resolve(0.600_001), Severity::High);
        assert_eq!(SEVERITY_TABLE.resolve(0.88), Severity::High);
        assert_eq!(SEVERITY_TABLE.resolve(0.999_999), Severity::High);

        let weights = SEVERITY_TABLE.weights();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[0].0, Severity::Medium);
        assert!((weights[0].1 - 0.6).abs() < 1e-9);
        assert_eq!(weights[1].0, Severity::High);
        assert!((weights[1].1 - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_only_status_500_is_anomalous() {
        let event = |status| ScanEvent {
            id: "e".to_string(),
            timestamp: "00:00:00".to_string(),
            url: "https://shop.test/v1/a".to_string(),
            payload: "x".to_string(),
            status,
            method: "GET".to_string(),
        };
        assert!(event(500).is_anomalous());
        assert!(!event(503).is_anomalous());
        assert!(!event(404).is_anomalous());
        assert!(!event(200).is_anomalous());
    }

    #[test]
    fn test_tick_requires_running() {
        let mut state = SessionState::default();
        let mut synth = EventSynthesizer::from_seed(Some(1));
        assert!(synth.tick(&mut state).is_none());
        assert!(state.logs().is_empty());
    }

    #[test]
    fn test_full_session_invariants() {
        let mut state = running_state(ScanMode::FullScan);
        let mut synth = EventSynthesizer::from_seed(Some(42));
        let mut ticks = 0u64;
        let mut last_progress = 0;
        let mut last_requests = 0;
        let mut urls = HashSet::new();

        while let Some(report) = synth.tick(&mut state) {
            ticks += 1;
            assert!(state.progress() >= last_progress && state.progress() <= 100);
            assert!((2..=6).contains(&report.burst));
            assert_eq!(state.total_requests(), last_requests + report.burst);
            assert!(matches!(report.event.status, 200 | 404 | 500));
            assert!(report.event.method == "GET" || report.event.method == "POST");
            assert!(report.event.url.starts_with("https://shop.test/v1/"));
            assert_eq!(report.new_endpoint, urls.insert(report.event.url.clone()));
            assert_eq!(state.total_endpoints(), urls.len());
            assert_eq!(report.finding.is_some(), report.event.status == ANOMALOUS_STATUS);
            assert!(state.logs().len() <= LOG_CAPACITY);
            assert_eq!(state.logs().last().unwrap(), &report.event);
            assert!(state.findings().len() as u64 <= ticks);

            if state.progress() == 100 {
                assert!(report.completed);
                assert!(!state.is_running());
            }
            last_progress = state.progress();
            last_requests = state.total_requests();
        }

        assert_eq!(ticks, 100);
        assert_eq!(state.progress(), 100);
        assert!(synth.tick(&mut state).is_none());
    }

    #[test]
    fn test_anomalous_tick_prepends_one_finding() {
        let mut state = running_state(ScanMode::FullScan);
        let mut synth = EventSynthesizer::from_seed(Some(9));

        while let Some(report) = synth.tick(&mut state) {
            if let Some(finding) = report.finding {
                assert_eq!(state.findings()[0], finding);
                assert_eq!(finding.url, report.event.url);
                assert_eq!(finding.payload, report.event.payload);
                assert!(PARAMETERS.contains(&finding.parameter.as_str()));
                assert!(VulnCategory::GENERIC.contains(&finding.category));
                assert!(matches!(finding.severity, Severity::High | Severity::Medium));
            }
        }
    }

    #[test]
    fn test_targeted_modes_pin_category() {
        for (mode, expected) in [
            (ScanMode::SqlInjection, VulnCategory::SqlInjection),
            (ScanMode::Xss, VulnCategory::CrossSiteScripting),
        ] {
            let mut state = running_state(mode);
            let mut synth = EventSynthesizer::from_seed(Some(3));
            while synth.tick(&mut state).is_some() {}
            assert!(state.findings().iter().all(|f| f.category == expected));
        }
    }

    #[test]
    fn test_same_seed_same_session() {
        let mut a = running_state(ScanMode::Basic);
        let mut b = running_state(ScanMode::Basic);
        let mut sa = EventSynthesizer::from_seed(Some(5));
        let mut sb = EventSynthesizer::from_seed(Some(5));
        while sa.tick(&mut a).is_some() {}
        while sb.tick(&mut b).is_some() {}

        let urls = |s: &SessionState| s.logs().iter().map(|l| l.url.clone()).collect::<Vec<_>>();
        assert_eq!(urls(&a), urls(&b));
        assert_eq!(a.total_requests(), b.total_requests());
        assert_eq!(a.findings().len(), b.findings().len());
    }

    #[test]
    fn test_snippet_truncates_payload() {
        let snippet = response_snippet("<script>alert(document.domain)</script>");
        assert!(snippet.contains("Exploit sequence detected: <script>alert(d..."));
        assert!(snippet.starts_with("HTTP/1.1 500"));
    }

    #[test]
    fn test_fix_recommendation_keyed_by_category() {
        let rec = fix_recommendation(VulnCategory::SqlInjection);
        assert!(rec.starts_with("Immediate remediation required for SQL Injection."));
        assert!(rec.contains("parameterized queries"));
        assert_ne!(rec, fix_recommendation(VulnCategory::Idor));
    }
}
