//! Shared components for CLI commands
//!
//! Logging setup, configuration loading and the small printing helpers used
//! by more than one command.

use crate::cli::args::LoggingArgs;
use crate::config::Config;
use crate::pipeline::{FlagSummary, RuleExecution};
use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use tracing::{debug, info};

/// Set up structured logging on stderr
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub fn setup_logging(args: &LoggingArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hydro_qc={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load the configuration file
///
/// An explicit path must exist. Without one the default location is used
/// when present, otherwise built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        info!("Using config file: {}", path.display());
        return Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    match Config::default_config_path() {
        Ok(path) if path.is_file() => {
            info!("Using config file: {}", path.display());
            Config::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        _ => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Print per-rule execution lines, highlighting rules that did not complete
pub fn print_rule_executions(executions: &[RuleExecution]) {
    for execution in executions {
        let status = if execution.status.is_completed() {
            execution.status.label().bright_green()
        } else {
            execution.status.label().bright_red().bold()
        };
        println!(
            "  {:<14} {:<16} {} flags",
            execution.rule.bright_cyan(),
            status,
            execution.flags_raised.to_string().bright_white().bold()
        );
        if let Some(detail) = execution.status.detail() {
            println!("      {}", detail.bright_red());
        }
        for warning in &execution.warnings {
            println!("      {}", warning.bright_yellow());
        }
    }
}

/// Print flag totals by kind and by severity
pub fn print_flag_summary(summary: &FlagSummary) {
    println!(
        "  {} {} flags on {} of {} samples",
        "Flags:".bright_cyan(),
        summary.total_flags.to_string().bright_white().bold(),
        summary.flagged_samples.to_string().bright_white().bold(),
        summary.total_samples
    );
    for (kind, count) in &summary.by_kind {
        println!("    {:<14} {}", kind.label(), count);
    }
    for (severity, count) in &summary.by_severity {
        println!("    {:<14} {}", severity.as_str(), count);
    }
}
