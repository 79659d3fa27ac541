use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn state_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Runs a complete offline session against a fresh state directory.
fn run_quick_scan(dir: &Path) {
    cargo_bin_cmd!("webfuzzer")
        .args(&["https://shop.test", "--offline", "--interval-ms", "1", "--seed", "7", "--state-dir", arg(dir)])
        .assert()
        .success()
        .stdout(predicate::str::contains("[+] Target:     https://shop.test"))
        .stdout(predicate::str::contains("[+] Scan complete."));
}

/// Single target with --dry-run should print the dry-run message and exit 0.
#[test]
fn test_single_target_dry_run() {
    cargo_bin_cmd!("webfuzzer")
        .args(&["http://example.com", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would scan target: http://example.com"));
}

/// Running with no arguments should fail (clap requires a target or an action).
#[test]
fn test_no_args_shows_error() {
    cargo_bin_cmd!("webfuzzer")
        .assert()
        .failure();
}

#[test]
fn test_depth_out_of_range_is_rejected() {
    cargo_bin_cmd!("webfuzzer")
        .args(&["http://example.com", "-d", "11", "--dry-run"])
        .assert()
        .failure();
}

#[test]
fn test_unknown_mode_is_rejected() {
    cargo_bin_cmd!("webfuzzer")
        .args(&["http://example.com", "-m", "ddos", "--dry-run"])
        .assert()
        .failure();
}

#[test]
fn test_config_file_dry_run() {
    let dir = state_dir();
    let config = dir.path().join("scan.json");
    std::fs::write(&config, r#"{"targetUrl": "https://api.shop.test", "scanType": "XSS Test", "depth": 4}"#).unwrap();

    cargo_bin_cmd!("webfuzzer")
        .args(&["--config", arg(&config), "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would scan target: https://api.shop.test"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = state_dir();
    let config = dir.path().join("scan.json");
    std::fs::write(&config, r#"{"target": "https://t", "depth": 0}"#).unwrap();

    cargo_bin_cmd!("webfuzzer")
        .args(&["--config", arg(&config), "--state-dir", arg(dir.path())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("depth must be between"));
}

#[test]
fn test_status_without_data() {
    let dir = state_dir();
    cargo_bin_cmd!("webfuzzer")
        .args(&["--status", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("No scan data found"));
}

#[test]
fn test_offline_scan_persists_and_reports() {
    let dir = state_dir();
    run_quick_scan(dir.path());

    assert!(dir.path().join("webfuzzer_progress_v3.json").exists());
    assert!(dir.path().join("webfuzzer_scanConfig_v3.json").exists());

    cargo_bin_cmd!("webfuzzer")
        .args(&["--status", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("[+] Target:     shop.test"))
        .stdout(predicate::str::contains("[+] Progress:   100%"))
        .stdout(predicate::str::contains("Idle"));
}

const PERSISTED_FINDING: &str = r#"[{
    "id": "f1",
    "url": "https://shop.test/v1/abc123",
    "parameter": "query",
    "payload": "' OR \"1\"=\"1",
    "type": "SQL Injection",
    "severity": "High",
    "responseSnippet": "HTTP/1.1 500 Internal Server Error",
    "fixRecommendation": "Immediate remediation required for SQL Injection."
}]"#;

/// Seeds a finished session holding one finding whose payload carries quotes.
fn write_finished_session(dir: &Path) {
    std::fs::write(dir.join("webfuzzer_scanConfig_v3.json"), r#"{"target": "https://shop.test"}"#).unwrap();
    std::fs::write(dir.join("webfuzzer_progress_v3.json"), "100").unwrap();
    std::fs::write(dir.join("webfuzzer_vulnerabilities_v3.json"), PERSISTED_FINDING).unwrap();
}

#[test]
fn test_export_writes_report_and_csv() {
    let dir = state_dir();
    write_finished_session(dir.path());

    let report = dir.path().join("audit.txt");
    let csv = dir.path().join("audit.csv");
    cargo_bin_cmd!("webfuzzer")
        .args(&["--export-report", arg(&report), "--export-csv", arg(&csv), "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"))
        .stdout(predicate::str::contains("CSV written to"));

    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.starts_with("SECURITY AUDIT REPORT\n"));
    assert!(text.contains("Target: https://shop.test"));
    assert!(text.contains("Total Vulnerabilities: 1"));
    assert!(text.contains("[High] SQL Injection"));

    let sheet = std::fs::read_to_string(&csv).unwrap();
    let mut lines = sheet.lines();
    assert_eq!(lines.next(), Some("ID,Vulnerability Type,Severity,URL,Parameter,Payload,Recommendation"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("f1,\"SQL Injection\",High,"));

    // Payload column: quoted, inner quotes doubled.
    let quoted = "\"' OR \"\"1\"\"=\"\"1\"";
    assert!(row.contains(quoted));
    let unquoted = quoted[1..quoted.len() - 1].replace("\"\"", "\"");
    assert_eq!(unquoted, "' OR \"1\"=\"1");
}

#[test]
fn test_offline_scan_exports_in_same_run() {
    let dir = state_dir();
    let csv = dir.path().join("run.csv");
    cargo_bin_cmd!("webfuzzer")
        .args(&["https://shop.test", "--offline", "--interval-ms", "1", "--seed", "7",
            "--export-csv", arg(&csv), "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("[+] Scan complete."));

    let findings = std::fs::read_to_string(dir.path().join("webfuzzer_vulnerabilities_v3.json")).unwrap();
    assert_eq!(csv.exists(), findings.trim() != "[]");
}

#[test]
fn test_read_only_queries_leave_state_untouched() {
    let dir = state_dir();
    let missing = dir.path().join("never-created");
    cargo_bin_cmd!("webfuzzer")
        .args(&["--status", "--results", "--state-dir", arg(&missing)])
        .assert()
        .success();
    assert!(!missing.exists());

    write_finished_session(dir.path());
    cargo_bin_cmd!("webfuzzer")
        .args(&["--results", "sql", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://shop.test/v1/abc123"));

    let progress = std::fs::read_to_string(dir.path().join("webfuzzer_progress_v3.json")).unwrap();
    assert_eq!(progress, "100");
    assert!(!dir.path().join("webfuzzer_totalRequests_v3.json").exists());
    let tab = std::fs::read_to_string(dir.path().join("webfuzzer_activeTab_v3.json")).unwrap();
    assert_eq!(tab, "\"results\"");
}

#[test]
fn test_export_without_findings_is_noop() {
    let dir = state_dir();
    let csv = dir.path().join("out.csv");

    cargo_bin_cmd!("webfuzzer")
        .args(&["--export-csv", arg(&csv), "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to export for CSV"));
    assert!(!csv.exists());
}

#[test]
fn test_resume_finishes_running_session() {
    let dir = state_dir();
    std::fs::write(dir.path().join("webfuzzer_scanConfig_v3.json"), r#"{"target": "https://shop.test"}"#).unwrap();
    std::fs::write(dir.path().join("webfuzzer_progress_v3.json"), "95").unwrap();
    std::fs::write(dir.path().join("webfuzzer_isScanning_v3.json"), "true").unwrap();

    cargo_bin_cmd!("webfuzzer")
        .args(&["--resume", "--offline", "--interval-ms", "1", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming persisted session"))
        .stdout(predicate::str::contains("[+] Scan complete."));

    let progress = std::fs::read_to_string(dir.path().join("webfuzzer_progress_v3.json")).unwrap();
    assert_eq!(progress.trim(), "100");
}

#[test]
fn test_resume_without_running_session() {
    let dir = state_dir();
    cargo_bin_cmd!("webfuzzer")
        .args(&["--resume", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("No running session to resume"));
}

#[test]
fn test_reset_clears_session() {
    let dir = state_dir();
    run_quick_scan(dir.path());

    cargo_bin_cmd!("webfuzzer")
        .args(&["--reset", "--status", "--state-dir", arg(dir.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared session"))
        .stdout(predicate::str::contains("No scan data found"));
}
