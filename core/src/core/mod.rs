pub mod engine;
pub mod outcome;
pub mod result_aggregator;
pub mod session;
pub mod state;
pub mod synth;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Scan profile selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScanMode {
    #[serde(rename = "Basic Fuzzing")]
    Basic,
    #[serde(rename = "SQL Injection Test")]
    SqlInjection,
    #[serde(rename = "XSS Test")]
    Xss,
    #[default]
    #[serde(rename = "Full Security Scan")]
    FullScan,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Basic => write!(f, "Basic Fuzzing"),
            ScanMode::SqlInjection => write!(f, "SQL Injection Test"),
            ScanMode::Xss => write!(f, "XSS Test"),
            ScanMode::FullScan => write!(f, "Full Security Scan"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = anyhow::Error;

    /// Accepts the short CLI names as well as the display names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "basic fuzzing" => Ok(ScanMode::Basic),
            "sqli" | "sql" | "sql injection test" => Ok(ScanMode::SqlInjection),
            "xss" | "xss test" => Ok(ScanMode::Xss),
            "full" | "full security scan" => Ok(ScanMode::FullScan),
            other => anyhow::bail!("unknown scan mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

/// Vulnerability classification attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnCategory {
    #[serde(rename = "SQL Injection")]
    SqlInjection,
    #[serde(rename = "Cross-Site Scripting")]
    CrossSiteScripting,
    #[serde(rename = "Broken Auth")]
    BrokenAuth,
    #[serde(rename = "IDOR")]
    Idor,
    #[serde(rename = "Remote Code Execution")]
    RemoteCodeExecution,
    #[serde(rename = "Command Injection")]
    CommandInjection,
}

impl VulnCategory {
    /// Categories drawn from when the scan mode does not pin one.
    pub const GENERIC: [VulnCategory; 4] = [
        VulnCategory::BrokenAuth,
        VulnCategory::Idor,
        VulnCategory::RemoteCodeExecution,
        VulnCategory::CommandInjection,
    ];

    /// Returns the category implied by a targeted scan mode, if any.
    pub fn pinned_by(mode: ScanMode) -> Option<Self> {
        match mode {
            ScanMode::SqlInjection => Some(VulnCategory::SqlInjection),
            ScanMode::Xss => Some(VulnCategory::CrossSiteScripting),
            ScanMode::Basic | ScanMode::FullScan => None,
        }
    }

    /// Category-specific remediation guidance.
    pub fn remediation(&self) -> &'static str {
        match self {
            VulnCategory::SqlInjection => {
                "Use parameterized queries or ORMs to handle database inputs. Never concatenate user strings into SQL commands."
            }
            VulnCategory::CrossSiteScripting => {
                "Sanitize all user-controlled input before rendering it in HTML. Use Content Security Policy (CSP) headers."
            }
            VulnCategory::BrokenAuth => {
                "Enforce server-side session validation, rotate tokens on login and rate-limit credential endpoints."
            }
            VulnCategory::Idor => {
                "Check object ownership on every request. Never trust client-supplied identifiers for authorization."
            }
            VulnCategory::RemoteCodeExecution => {
                "Remove dynamic evaluation of user input and run services with least privilege."
            }
            VulnCategory::CommandInjection => {
                "Avoid shell invocation with user input. Pass arguments as arrays and validate against an allow-list."
            }
        }
    }
}

impl fmt::Display for VulnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VulnCategory::SqlInjection => "SQL Injection",
            VulnCategory::CrossSiteScripting => "Cross-Site Scripting",
            VulnCategory::BrokenAuth => "Broken Auth",
            VulnCategory::Idor => "IDOR",
            VulnCategory::RemoteCodeExecution => "Remote Code Execution",
            VulnCategory::CommandInjection => "Command Injection",
        };
        write!(f, "{}", label)
    }
}

/// The view the operator last had open. Persisted alongside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    #[default]
    Landing,
    Dashboard,
    NewScan,
    Scans,
    Results,
    Reports,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_parses_short_and_display_names() {
        assert_eq!("sqli".parse::<ScanMode>().unwrap(), ScanMode::SqlInjection);
        assert_eq!("XSS Test".parse::<ScanMode>().unwrap(), ScanMode::Xss);
        assert_eq!("full".parse::<ScanMode>().unwrap(), ScanMode::FullScan);
        assert!("deep".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_scan_mode_serializes_display_name() {
        let json = serde_json::to_string(&ScanMode::Basic).unwrap();
        assert_eq!(json, "\"Basic Fuzzing\"");
    }

    #[test]
    fn test_pinned_category() {
        assert_eq!(VulnCategory::pinned_by(ScanMode::SqlInjection), Some(VulnCategory::SqlInjection));
        assert_eq!(VulnCategory::pinned_by(ScanMode::Xss), Some(VulnCategory::CrossSiteScripting));
        assert_eq!(VulnCategory::pinned_by(ScanMode::FullScan), None);
        assert_eq!(VulnCategory::pinned_by(ScanMode::Basic), None);
    }

    #[test]
    fn test_section_round_trip() {
        let json = serde_json::to_string(&Section::NewScan).unwrap();
        assert_eq!(json, "\"new-scan\"");
        let back: Section = serde_json::from_str("\"scans\"").unwrap();
        assert_eq!(back, Section::Scans);
    }
}
