//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::OutputFormat;
use crate::models::CountBy;
use clap::Parser;
use std::path::PathBuf;

/// modstat - environment-module usage from batch job scripts
///
/// Scans job submission scripts, replays their `module load/purge/swap`
/// commands, and ranks the modules jobs actually ended up with.
///
/// Examples:
///   modstat /apps/jobscripts
///   modstat /apps/jobscripts/2017-10-* --top-n 20 --format table
///   modstat jobs/ --count-by name --job-xml --format json -o ranking.json
///   modstat --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directories or script files to scan
    #[arg(value_name = "PATH", required_unless_present = "init_config")]
    pub paths: Vec<PathBuf>,

    /// Number of modules to report [default: 50]
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Toolchain year assumed when a script selects none [default: 2014]
    #[arg(long, value_name = "YEAR", env = "MODSTAT_DEFAULT_TOOLCHAIN_YEAR")]
    pub default_toolchain_year: Option<u16>,

    /// Output file for the ranking (standard output if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format [default: plain]
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// What to count per loaded module [default: module]
    #[arg(long, value_name = "KEY")]
    pub count_by: Option<CountBy>,

    /// Attach the companion .JB job record to each .SC script
    #[arg(long)]
    pub job_xml: bool,

    /// Number of scripts extracted concurrently [default: 4]
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Maximum number of scripts to process
    #[arg(long, value_name = "COUNT")]
    pub max_files: Option<usize>,

    /// Script extensions to include (comma-separated)
    ///
    /// Example: --extensions SC,pbs
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Names to exclude from scanning (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .modstat.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the scripts that would be processed and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .modstat.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.paths.is_empty() {
            return Err("At least one script directory or file is required".to_string());
        }

        if self.top_n == Some(0) {
            return Err("--top-n must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_files == Some(0) {
            return Err("Max files must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for path in &self.paths {
            if !path.exists() {
                return Err(format!("Path does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
