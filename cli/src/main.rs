use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use webfuzzer_core::core::state::DEFAULT_STATE_DIR;
use webfuzzer_core::reporting::{
    default_csv_name, default_report_name, display_target, render_csv, render_text_report, write_export,
};
use webfuzzer_core::{
    ConsoleSink, EngineSettings, FileBackend, Finding, GeminiGenerator, PayloadSet, ResultAggregator,
    ScanConfig, ScanEngine, ScanEvent, ScanEventSink, ScanMode, Section, SessionState, Severity, SinkRef,
    DEFAULT_MODEL,
};

#[derive(Parser, Debug)]
#[command(
    name = "WEBFUZZER",
    version,
    about = "Simulated web security fuzzing dashboard",
    override_usage = "webfuzzer <target>  <options>",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Quick scan:                     webfuzzer https://target.com
  SQL injection profile:          webfuzzer https://target.com -m sqli -d 5
  Offline (built-in payloads):    webfuzzer https://target.com --offline
  Custom payload list:            webfuzzer https://target.com -p payloads.txt
  Continue an interrupted scan:   webfuzzer --resume
  Dashboard of the last scan:     webfuzzer --status
  Search findings:                webfuzzer --results auth
  Export report and CSV:          webfuzzer --export-report --export-csv findings.csv"
)]
pub struct Args {
    #[arg(required_unless_present_any = ["config", "resume", "status", "results", "export_report", "export_csv", "reset"])]
    pub target: Option<String>,

    #[arg(short = 'm', long, default_value = "full",
        value_parser = clap::builder::PossibleValuesParser::new(["basic", "sqli", "xss", "full"]),
        help = "Scan profile: basic, sqli, xss or full")]
    pub mode: String,

    #[arg(short = 'd', long, default_value_t = 3,
        value_parser = clap::value_parser!(u8).range(1..=10),
        help = "Exploration depth (1-10)")]
    pub depth: u8,

    #[arg(long, help = "Exclude SQL injection payloads from generation")]
    pub no_sql: bool,

    #[arg(long, help = "Exclude XSS payloads from generation")]
    pub no_xss: bool,

    #[arg(long, help = "Include overflow / long string payloads")]
    pub long_string: bool,

    #[arg(long, help = "Include encoding obfuscation payloads")]
    pub special_char: bool,

    #[arg(long, help = "Free-text seed for payload generation")]
    pub custom: Option<String>,

    #[arg(short = 'p', long, help = "Use the payloads from a file instead of generating them")]
    pub payloads: Option<PathBuf>,

    #[arg(long, help = "Load the scan configuration from a JSON file")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_STATE_DIR, help = "Directory holding the persisted session")]
    pub state_dir: PathBuf,

    #[arg(long, default_value_t = 800, help = "Tick interval in milliseconds")]
    pub interval_ms: u64,

    #[arg(long, default_value_t = 8, help = "Payload generation timeout in seconds")]
    pub timeout: u64,

    #[arg(long, default_value = DEFAULT_MODEL, help = "Generative model used for payloads")]
    pub model: String,

    #[arg(long, help = "Proxy URL for the generation request (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(long, help = "Skip payload generation and use the built-in list")]
    pub offline: bool,

    #[arg(long, help = "Seed for a reproducible simulated session")]
    pub seed: Option<u64>,

    #[arg(long, help = "Continue the persisted session if it was still running")]
    pub resume: bool,

    #[arg(long, help = "Show the dashboard for the persisted session")]
    pub status: bool,

    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "QUERY",
        help = "List findings, optionally filtered by type or URL")]
    pub results: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "FILE",
        help = "Export the plain-text audit report")]
    pub export_report: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "FILE",
        help = "Export findings as CSV")]
    pub export_csv: Option<String>,

    #[arg(long, help = "Delete the persisted session")]
    pub reset: bool,

    #[arg(long, help = "Print what would be scanned and exit")]
    pub dry_run: bool,

    #[arg(short = 'v', long, default_value_t = false, help = "Show every simulated request (Verbose Mode)")]
    pub verbose: bool,
}

/// Console sink that keeps an indicatif progress bar below the log output.
struct CliSink {
    inner: SinkRef,
    bar: ProgressBar,
}

impl CliSink {
    fn new_ref(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Arc::new(Self { inner: ConsoleSink::new_ref(verbose), bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanEventSink for CliSink {
    fn on_log(&self, level: &str, message: &str) {
        self.bar.suspend(|| self.inner.on_log(level, message));
    }

    fn on_event(&self, event: &ScanEvent) {
        self.bar.suspend(|| self.inner.on_event(event));
    }

    fn on_finding(&self, finding: &Finding) {
        self.bar.suspend(|| self.inner.on_finding(finding));
        self.bar.set_message(format!("last: {}", finding.category));
    }

    fn on_progress(&self, progress: u8) {
        self.bar.set_position(u64::from(progress));
    }
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();

    let default_filter = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    print_banner();

    if let Err(e) = run(args).await {
        eprint!("{}\r\n", format!("[!] {:#}", e).red());
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let backend = Arc::new(FileBackend::new(&args.state_dir));

    let scan_config = if args.target.is_some() || args.config.is_some() {
        Some(build_config(&args)?)
    } else {
        None
    };

    if args.dry_run {
        if let Some(config) = &scan_config {
            println!("[DRY RUN] Would scan target: {}", config.target);
        }
        return Ok(());
    }

    let sink = CliSink::new_ref(args.verbose);
    let engine = build_engine(&args, backend, Arc::clone(&sink) as SinkRef)?;

    if args.reset {
        engine.reset().await?;
        print!("{}\r\n", format!("[+] Cleared session in {}", args.state_dir.display()).green());
    }

    if let Some(config) = scan_config {
        print_scan_config(&config, &args);
        let generation = engine.start_session(config).await?;
        run_until_done_or_interrupted(&engine, generation, &sink).await;
        ResultAggregator::report_summary(&engine.snapshot().await, &(Arc::clone(&sink) as SinkRef));
    } else if args.resume {
        match engine.resume().await {
            Some(generation) => {
                sink.on_log("phase", "[*] Resuming persisted session...");
                run_until_done_or_interrupted(&engine, generation, &sink).await;
                ResultAggregator::report_summary(&engine.snapshot().await, &(Arc::clone(&sink) as SinkRef));
            }
            None => sink.on_log("warn", "[!] No running session to resume."),
        }
    }

    if args.status {
        engine.set_active_section(Section::Dashboard).await;
        print_dashboard(&engine.snapshot().await, &args.state_dir);
    }

    if let Some(query) = &args.results {
        engine.set_active_section(Section::Results).await;
        print_results(engine.snapshot().await.findings(), query);
    }

    if args.export_report.is_some() || args.export_csv.is_some() {
        engine.set_active_section(Section::Reports).await;
        let state = engine.snapshot().await;

        if let Some(name) = &args.export_report {
            let path = export_path(name, default_report_name);
            let written = write_export(&path, render_text_report(state.config(), state.findings()))?;
            print_export_outcome("Report", written.as_deref());
        }
        if let Some(name) = &args.export_csv {
            let path = export_path(name, default_csv_name);
            let written = write_export(&path, render_csv(state.findings()))?;
            print_export_outcome("CSV", written.as_deref());
        }
    }

    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_json_file(path)?,
        None => {
            let mut config = ScanConfig::default();
            config.mode = args.mode.parse::<ScanMode>()?;
            config.depth = args.depth;
            config.payloads.sql = !args.no_sql;
            config.payloads.xss = !args.no_xss;
            config.payloads.long_string = args.long_string;
            config.payloads.special_char = args.special_char;
            config.payloads.custom = args.custom.clone().unwrap_or_default();
            config
        }
    };
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_engine(args: &Args, backend: Arc<FileBackend>, sink: SinkRef) -> anyhow::Result<ScanEngine> {
    let mut settings = EngineSettings::from_env();
    settings.tick_interval = Duration::from_millis(args.interval_ms.max(1));
    settings.fetch_timeout = Duration::from_secs(args.timeout.max(1));
    settings.model = args.model.clone();
    settings.proxy = args.proxy.clone();
    settings.seed = args.seed;

    let generator = if args.offline || args.payloads.is_some() {
        None
    } else {
        GeminiGenerator::from_settings(&settings)?
    };

    let mut engine = ScanEngine::new(backend, settings, sink.clone());

    if let Some(path) = &args.payloads {
        let payloads = PayloadSet::from_file(path)?;
        sink.on_log("success", &format!("[+] Loaded {} payload(s) from {}", payloads.len(), path.display()));
        engine = engine.with_payloads(payloads);
    } else if let Some(generator) = generator {
        engine = engine.with_generator(Arc::new(generator));
    } else if !args.offline && args.target.is_some() {
        sink.on_log("warn", "[!] No GEMINI_API_KEY set, using built-in payloads.");
    }

    Ok(engine)
}

async fn run_until_done_or_interrupted(engine: &ScanEngine, generation: u64, sink: &CliSink) {
    tokio::select! {
        _ = engine.run_ticks(generation) => {}
        _ = tokio::signal::ctrl_c() => {
            sink.on_log("warn", "[!] Interrupted. Session saved, continue with --resume.");
        }
    }
    sink.finish();
}

fn export_path(name: &str, default_name: fn() -> String) -> PathBuf {
    if name.is_empty() {
        PathBuf::from(default_name())
    } else {
        PathBuf::from(name)
    }
}

fn print_export_outcome(kind: &str, written: Option<&Path>) {
    match written {
        Some(path) => print!("{}\r\n", format!("[+] {} written to {}", kind, path.display()).green().bold()),
        None => print!("{}\r\n", format!("[*] Nothing to export for {}.", kind).yellow()),
    }
    std::io::stdout().flush().ok();
}

fn print_banner() {
    print!("{}\r\n", "  W E B F U Z Z E R  ::  simulated security audit".bright_cyan().bold());
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}

fn print_scan_config(config: &ScanConfig, args: &Args) {
    let verbose_label = if args.verbose { "ON" } else { "OFF" };

    print!("{}\r\n", format!("[+] Target:     {}", config.target).green().bold());
    print!("{}\r\n", format!("[+] Mode:       {}", config.mode).magenta().bold());
    print!("{}\r\n", format!("[+] Depth:      {}", config.depth).blue());
    print!("{}\r\n", format!("[+] Interval:   {}ms", args.interval_ms).blue());
    print!("{}\r\n", format!("[+] Verbose:    {}", verbose_label).magenta());
    print!("{}\r\n", format!("[+] State:      {}", args.state_dir.display()).blue());
    let labels = config.payloads.enabled_labels();
    if !labels.is_empty() {
        print!("{}\r\n", format!("[+] Payloads:   {}", labels.join(", ")).yellow());
    }
    if !config.payloads.custom.is_empty() {
        print!("{}\r\n", format!("[+] Seed:       {}", config.payloads.custom).yellow());
    }
    if let Some(seed) = args.seed {
        print!("{}\r\n", format!("[+] RNG seed:   {}", seed).yellow());
    }
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}

fn print_dashboard(state: &SessionState, state_dir: &Path) {
    if state.is_empty() {
        print!("{}\r\n", format!("[*] No scan data found in {}.", state_dir.display()).yellow());
        return;
    }

    let summary = ResultAggregator::summarize(state);
    let target = state.config().map(|c| display_target(&c.target)).unwrap_or_else(|| "Previous Audit".to_string());
    let status = if summary.running { "Running".yellow() } else { "Idle".green() };

    print!("{}\r\n", format!("[+] Target:     {}", target).green().bold());
    print!("{}\r\n", format!("[+] Status:     {}", status));
    print!("{}\r\n", format!("[+] Progress:   {}%", summary.progress).bright_cyan());
    print!("{}\r\n", format!("[+] Requests:   {}", summary.total_requests).blue());
    print!("{}\r\n", format!("[+] Endpoints:  {}", summary.total_endpoints).blue());
    print!("{}\r\n", format!("[+] Findings:   {} ({} high)", summary.findings, summary.critical).red().bold());
    print!("    SQL Injection:        {}\r\n", summary.sql_injection);
    print!("    Cross-Site Scripting: {}\r\n", summary.xss);
    print!("    Broken Auth:          {}\r\n", summary.broken_auth);
    print!("    Other Vectors:        {}\r\n", summary.other);
    print!(
        "{}\r\n",
        format!(
            "[+] Responses:  {:.1}% ok | {:.1}% missing | {:.1}% errors",
            summary.status_mix.success, summary.status_mix.missing, summary.status_mix.errors
        )
        .dimmed()
    );
    std::io::stdout().flush().ok();
}

fn print_results(findings: &[Finding], query: &str) {
    let matches = ResultAggregator::search(findings, query);
    if matches.is_empty() {
        print!("{}\r\n", "[*] No matching findings.".yellow());
        return;
    }
    for f in matches {
        let severity = match f.severity {
            Severity::High => f.severity.to_string().red().bold(),
            _ => f.severity.to_string().yellow(),
        };
        print!("{} {:<22} {} [{}]\r\n", severity, f.category.to_string(), f.url, f.parameter);
        print!("    Payload:  {}\r\n", f.payload.bright_yellow());
        print!("    Response: {}\r\n", f.response_snippet.replace('\n', " | ").dimmed());
        print!("    Fix:      {}\r\n", f.fix_recommendation);
    }
    std::io::stdout().flush().ok();
}
