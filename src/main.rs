//! Veriscore - composite authenticity scoring from the command line.
//!
//! Reads an analysis request as JSON, scores it with every applicable
//! detector and service, and prints the composite result.
//!
//! Exit codes:
//!   0 - Success (verdict below --fail-on, or no --fail-on set)
//!   1 - Runtime error (config, unreadable input, unhealthy services
//!       with --check-health)
//!   2 - Verdict at or above the --fail-on level

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use veriscore::cli::{Args, OutputFormat};
use veriscore::config::{Config, DEFAULT_CONFIG_FILE};
use veriscore::report::{self, ReportMetadata};
use veriscore::{AnalysisRequest, Orchestrator, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Veriscore v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .veriscore.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set service endpoints, timeouts, weights and thresholds.");
    Ok(())
}

/// Initialize logging on stderr; stdout carries the report.
///
/// `RUST_LOG` wins over --verbose/--quiet when set.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the selected command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    if args.list_agents {
        return handle_list_agents(&config);
    }

    let orchestrator = Orchestrator::from_config(&config)?;

    if args.check_health {
        return handle_check_health(&orchestrator).await;
    }

    let (request, input_label) = read_request(&args)?;
    let start_time = Instant::now();

    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message("Scoring content...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let outcome = orchestrator.analyze(&request).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let result = outcome?;

    let metadata = ReportMetadata::new(input_label, start_time.elapsed().as_millis());
    let output = match OutputFormat::from_config(&config.general.format) {
        OutputFormat::Json => report::generate_json_report(&result)?,
        OutputFormat::Markdown => report::generate_markdown_report(&result, &metadata),
    };

    match &args.output {
        Some(path) => {
            report::save_report(&output, path)?;
            if !args.quiet {
                eprintln!("📝 Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    if !args.quiet {
        eprintln!(
            "{} {} (score {:.1}, {} answered, {} missing, {}ms)",
            result.verdict.emoji(),
            result.verdict,
            result.composite_score,
            result.answered_count(),
            result.missing_agents.len(),
            metadata.duration_ms
        );
    }

    if let Some(level) = args.fail_on {
        if level.is_met(result.verdict) {
            eprintln!(
                "\n⛔ Verdict {} is at or above {:?}. Failing (exit code 2).",
                result.verdict, level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --list-agents: print the effective registry.
fn handle_list_agents(config: &Config) -> Result<i32> {
    let registry = Registry::from_config(&config.agents)?;

    println!(
        "{:<16} {:<9} {:>6}  {:<8} REQUIRES",
        "AGENT", "KIND", "WEIGHT", "ENABLED"
    );
    for d in registry.descriptors() {
        let fields: Vec<_> = d.required_fields.iter().map(|f| f.as_str()).collect();
        println!(
            "{:<16} {:<9} {:>6.2}  {:<8} {}",
            d.id,
            d.kind.to_string().to_uppercase(),
            d.weight,
            if d.enabled { "yes" } else { "no" },
            fields.join(", ")
        );
    }
    Ok(0)
}

/// Handle --check-health: probe every enabled external service.
async fn handle_check_health(orchestrator: &Orchestrator) -> Result<i32> {
    let report = orchestrator.check_health().await;
    if report.is_empty() {
        println!("No external agents are enabled.");
        return Ok(0);
    }

    for health in &report {
        let endpoint = orchestrator
            .config()
            .agent(health.id)
            .endpoint
            .unwrap_or_default();
        let mark = if health.endpoint_healthy { "✅" } else { "❌" };
        println!("{} {:<16} {}", mark, health.id, endpoint);
    }

    let down = report.iter().filter(|h| !h.endpoint_healthy).count();
    if down > 0 {
        warn!("{} of {} external agents are unreachable", down, report.len());
        return Ok(1);
    }
    Ok(0)
}

/// Read and parse the request from a file or stdin.
fn read_request(args: &Args) -> Result<(AnalysisRequest, String)> {
    let (raw, label) = match &args.input {
        Some(path) if !args.reads_stdin() => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input: {}", path.display()))?;
            (raw, path.display().to_string())
        }
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read request from stdin")?;
            (raw, "stdin".to_string())
        }
    };

    let request: AnalysisRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse analysis request from {}", label))?;
    Ok((request, label))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
