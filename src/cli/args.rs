//! Command-line argument definitions for hydro-qc
//!
//! This module defines the CLI interface using the clap derive API: a
//! single-series `run`, a multi-station `batch` and an `init` command that
//! writes sample data.

use crate::constants::sample;
use crate::error::{QcError, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the hydrological QC toolkit
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hydro-qc",
    version,
    about = "Rule-based quality control for hydrological time series",
    long_about = "Runs range, stuck-sensor, MAD spike and step-rate checks over water level \
                  and rainfall series read from CSV, writes per-sample flags and combined \
                  outputs, and produces a one-page Markdown summary per station."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// QC a single series described by a config file
    Run(RunArgs),
    /// QC every CSV matching a glob, one station per file
    Batch(BatchArgs),
    /// Write sample data and a matching config to try the toolkit
    Init(InitArgs),
}

/// Verbosity flags shared by every command
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct LoggingArgs {
    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl LoggingArgs {
    /// Determine the log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Arguments for the run command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    /// TOML configuration file
    ///
    /// Defaults to <config dir>/hydro-qc/config.toml, or built-in defaults
    /// when that file does not exist.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input CSV, overriding data.input_csv
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory for all outputs, keeping the configured file names
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Station name used in the report
    #[arg(short = 's', long = "station", value_name = "NAME")]
    pub station: Option<String>,

    /// Evaluate rules on parallel worker threads
    #[arg(long = "concurrent")]
    pub concurrent: bool,

    /// Validate configuration and show the plan without reading data
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Disable progress indicators
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Output format for the run summary
    #[arg(long = "output-format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Arguments for the batch command
#[derive(Debug, Clone, Parser)]
pub struct BatchArgs {
    /// TOML configuration applied to every station
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Glob pattern selecting station CSV files (e.g. "data/**/*.csv")
    #[arg(long = "inputs", value_name = "GLOB")]
    pub inputs: String,

    /// Root directory; each station writes to <output-dir>/<station>/
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Number of stations processed at once
    #[arg(short = 'j', long = "jobs", value_name = "COUNT")]
    pub jobs: Option<usize>,

    /// Evaluate rules on parallel worker threads within each station
    #[arg(long = "concurrent")]
    pub concurrent: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Output format for the batch summary
    #[arg(long = "output-format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Arguments for the init command
#[derive(Debug, Clone, Parser)]
pub struct InitArgs {
    /// Directory receiving data.csv and config.toml
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = "demo")]
    pub dir: PathBuf,

    /// Number of samples to generate
    #[arg(long = "points", default_value_t = sample::DEFAULT_POINTS)]
    pub points: usize,

    /// Minutes between samples
    #[arg(long = "interval-minutes", default_value_t = sample::DEFAULT_INTERVAL_MINUTES)]
    pub interval_minutes: u32,

    /// Random seed for reproducible data
    #[arg(long = "seed", default_value_t = sample::DEFAULT_SEED)]
    pub seed: u64,

    /// Replace existing files
    #[arg(long = "overwrite")]
    pub overwrite: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Output format options for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
    /// metric,value CSV lines
    Csv,
}

impl Commands {
    pub fn logging(&self) -> &LoggingArgs {
        match self {
            Commands::Run(args) => &args.logging,
            Commands::Batch(args) => &args.logging,
            Commands::Init(args) => &args.logging,
        }
    }
}

impl RunArgs {
    /// Check argument consistency before any work starts
    pub fn validate(&self) -> Result<()> {
        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(QcError::configuration(format!(
                    "Config file does not exist: {}",
                    config.display()
                )));
            }
        }
        if let Some(station) = &self.station {
            if station.trim().is_empty() {
                return Err(QcError::configuration("Station name must not be empty"));
            }
        }
        Ok(())
    }

    /// Progress is shown for human output unless quiet or disabled
    pub fn show_progress(&self) -> bool {
        !self.no_progress && !self.logging.quiet && self.output_format == OutputFormat::Human
    }
}

impl BatchArgs {
    pub fn validate(&self) -> Result<()> {
        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(QcError::configuration(format!(
                    "Config file does not exist: {}",
                    config.display()
                )));
            }
        }
        if self.inputs.trim().is_empty() {
            return Err(QcError::configuration("Input pattern must not be empty"));
        }
        match self.jobs {
            Some(0) => Err(QcError::configuration(
                "Number of jobs must be greater than 0",
            )),
            Some(jobs) if jobs > 256 => Err(QcError::configuration(
                "Number of jobs cannot exceed 256",
            )),
            _ => Ok(()),
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.no_progress && !self.logging.quiet && self.output_format == OutputFormat::Human
    }
}

impl InitArgs {
    pub fn validate(&self) -> Result<()> {
        if self.points == 0 {
            return Err(QcError::configuration("Number of points must be greater than 0"));
        }
        if self.interval_minutes == 0 {
            return Err(QcError::configuration(
                "Interval must be at least one minute",
            ));
        }
        Ok(())
    }
}
