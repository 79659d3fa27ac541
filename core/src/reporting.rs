//! Report exports for collected findings.
//!
//! Produces a plain-text audit report and a CSV sheet. Both are no-ops
//! (`None`) when there is nothing to export.

use std::path::{Path, PathBuf};

use url::Url;

use crate::core::result_aggregator::Finding;
use crate::ScanConfig;

const CSV_HEADERS: [&str; 7] = [
    "ID",
    "Vulnerability Type",
    "Severity",
    "URL",
    "Parameter",
    "Payload",
    "Recommendation",
];

/// Renders the text report. Requires a configured target and at least one finding.
pub fn render_text_report(config: Option<&ScanConfig>, findings: &[Finding]) -> Option<String> {
    let config = config?;
    if findings.is_empty() {
        return None;
    }

    let mut content = format!(
        "SECURITY AUDIT REPORT\n--------------------\nTarget: {}\nTotal Vulnerabilities: {}\n",
        config.target,
        findings.len()
    );
    for f in findings {
        content.push_str(&format!(
            "\n[{}] {}\nURL: {}\nPayload: {}\nRec: {}\n",
            f.severity, f.category, f.url, f.payload, f.fix_recommendation
        ));
    }
    Some(content)
}

/// Renders findings as CSV, one row per finding, every text field quoted.
pub fn render_csv(findings: &[Finding]) -> Option<String> {
    if findings.is_empty() {
        return None;
    }

    let mut lines = vec![CSV_HEADERS.join(",")];
    for f in findings {
        let row = [
            f.id.clone(),
            csv_field(&f.category.to_string()),
            f.severity.to_string(),
            csv_field(&f.url),
            csv_field(&f.parameter),
            csv_field(&f.payload),
            csv_field(&f.fix_recommendation),
        ];
        lines.push(row.join(","));
    }
    Some(lines.join("\n"))
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Target label for report listings, without the URL scheme.
pub fn display_target(target: &str) -> String {
    match Url::parse(target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            target.trim_start_matches("https://").trim_start_matches("http://").to_string()
        }
        _ => target.to_string(),
    }
}

pub fn default_report_name() -> String {
    format!("Audit_Report_{}.txt", chrono::Utc::now().timestamp_millis())
}

pub fn default_csv_name() -> String {
    format!("security_audit_export_{}.csv", chrono::Utc::now().timestamp_millis())
}

/// Writes `content` to `path` when present. Returns the written path.
pub fn write_export(path: &Path, content: Option<String>) -> anyhow::Result<Option<PathBuf>> {
    let Some(content) = content else {
        return Ok(None);
    };
    std::fs::write(path, content)?;
    Ok(Some(path.to_path_buf()))
}
