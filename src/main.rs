//! modstat - environment-module usage statistics
//!
//! A CLI tool that scans batch job submission scripts, replays their
//! environment-module commands, and ranks the modules jobs ended up
//! loading.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, unreadable paths, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod extract;
mod jobxml;
mod models;
mod report;
mod scanner;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use extract::Extractor;
use models::{Report, ReportMetadata};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("modstat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("modstat failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .modstat.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    println!("Edit it to customize module verbs, toolchain patterns, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so the ranking on stdout stays machine-readable.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Scan, extract, count and report.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let file_scanner = scanner::FileScanner::new(args.paths.clone(), scan_config);
    let scripts = file_scanner.scan()?;
    info!("Found {} scripts", scripts.len());

    if args.dry_run {
        return handle_dry_run(&scripts);
    }

    let extractor = Extractor::new(&config.extractor).context("Invalid [extractor] settings")?;
    debug!("Default toolchain year: {}", extractor.default_year());

    let options = analysis::BatchOptions {
        concurrency: config.general.concurrency,
        count_by: config.report.count_by,
        job_records: config.general.job_records,
        show_progress: !args.quiet && config.report.output.is_some(),
    };
    let result = analysis::run_batch(scripts, Arc::new(extractor), &options).await?;
    let stats = result.stats;
    let counter = result.counter;

    info!(
        "Scripts: {} | readable: {} | with modules: {} ({:.2}%) | without modules: {} | unreadable: {} ({:.2}%)",
        stats.total,
        stats.readable(),
        stats.with_modules,
        stats.percent_with_modules(),
        stats.without_modules,
        stats.unreadable,
        stats.percent_unreadable()
    );
    if stats.unreadable > 0 {
        warn!("{} scripts could not be read", stats.unreadable);
    }
    if counter.is_empty() {
        warn!("No module loads found");
    }

    let report = Report {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            count_by: config.report.count_by,
            top_n: config.report.top_n,
            distinct_modules: counter.len(),
            total_loads: counter.total(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        ranking: counter.top_n(config.report.top_n),
        stats,
    };

    let output = report::generate_report(&report, config.report.format)?;
    let output_path = config.report.output.as_ref().map(PathBuf::from);
    report::write_output(&output, output_path.as_deref()).with_context(|| match output_path {
        Some(ref p) => format!("Failed to write report to {}", p.display()),
        None => "Failed to write report to stdout".to_string(),
    })?;

    if let Some(ref path) = output_path {
        info!("Ranking of {} modules saved to {}", report.ranking.len(), path.display());
    }

    Ok(())
}

/// Handle --dry-run: list the scripts that would be processed, then exit.
fn handle_dry_run(scripts: &[PathBuf]) -> Result<()> {
    if scripts.is_empty() {
        println!("No matching scripts found.");
    } else {
        for script in scripts {
            println!("{}", script.display());
        }
        println!("\nTotal: {} scripts", scripts.len());
    }
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
