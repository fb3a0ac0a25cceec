//! Single-series QC command
//!
//! Loads the configuration, applies CLI overrides, runs the pipeline over
//! one CSV and writes flags, combined outputs and the Markdown report.

use super::shared::{load_config, print_flag_summary, print_rule_executions};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::processor::discovery::StationInput;
use crate::processor::{StationAnalysis, StationProcessor};
use crate::rules::RuleRegistry;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(mut config: Config, args: &RunArgs) -> Config {
    if let Some(input) = &args.input {
        config = config.with_input(input.clone());
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(station) = &args.station {
        config = config.with_station_name(station.clone());
    }
    if args.concurrent {
        config = config.with_concurrent(true);
    }
    config
}

pub async fn run_single(args: RunArgs) -> Result<()> {
    args.validate()?;
    let start_time = Instant::now();

    let config = apply_overrides(load_config(args.config.as_deref())?, &args);
    config.validate().context("Invalid configuration")?;

    if args.dry_run {
        return print_plan(&config);
    }

    let processor = StationProcessor::new(config.clone())?;
    let input = StationInput::new(
        config.output.station_name.clone(),
        config.data.input_csv.clone(),
    );

    let spinner = if args.show_progress() {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    } else {
        ProgressBar::hidden()
    };

    spinner.set_message(format!("Running QC on {}", input.path.display()));
    let analysis = processor
        .analyze(&input)
        .await
        .with_context(|| format!("Failed to QC {}", input.path.display()))?;

    spinner.set_message("Writing outputs");
    let outputs = processor
        .write_outputs(&analysis, &config.output)
        .context("Failed to write outputs")?;
    spinner.finish_and_clear();

    for failure in analysis.result.failures() {
        warn!(
            "Rule {} {}: {}",
            failure.rule,
            failure.status.label(),
            failure.status.detail().unwrap_or_default()
        );
    }
    info!("QC finished in {:?}", start_time.elapsed());

    match args.output_format {
        OutputFormat::Human => print_human(&config, &analysis, &outputs, start_time.elapsed()),
        OutputFormat::Json => print_json(&config, &analysis, &outputs)?,
        OutputFormat::Csv => print_csv(&analysis),
    }
    Ok(())
}

/// Describe what a run would do without touching the data
fn print_plan(config: &Config) -> Result<()> {
    let registry = RuleRegistry::from_config(&config.qc)?;

    println!("{}", "Dry run: nothing will be read or written".bright_yellow().bold());
    println!("  {} {}", "Station:".bright_cyan(), config.output.station_name);
    println!("  {} {}", "Input:".bright_cyan(), config.data.input_csv.display());
    println!(
        "  {} {} / {}",
        "Columns:".bright_cyan(),
        config.data.time_column,
        config.data.value_column
    );
    println!(
        "  {} {}",
        "Interval:".bright_cyan(),
        config.data.nominal_interval.as_deref().unwrap_or("inferred from data")
    );
    println!(
        "  {} {}",
        "Rules:".bright_cyan(),
        if registry.is_empty() {
            "(none enabled)".to_string()
        } else {
            registry.names().join(" -> ")
        }
    );
    println!(
        "  {} {}",
        "Concurrent:".bright_cyan(),
        config.pipeline.concurrent
    );
    println!("  {}", "Outputs:".bright_cyan());
    for path in config.output.paths() {
        println!("    {}", path.display());
    }
    if let Some(chart) = config.output.chart_path(&config.data.value_column) {
        println!("    {}", chart.display());
    }
    Ok(())
}

fn print_human(config: &Config, analysis: &StationAnalysis, outputs: &[PathBuf], elapsed: Duration) {
    let result = &analysis.result;
    let summary = result.summary();

    println!(
        "\n{} {}",
        "QC complete:".bright_green().bold(),
        config.output.station_name.bright_white().bold()
    );
    println!(
        "  {} {} ({} missing)",
        "Samples:".bright_cyan(),
        result.series().len().to_string().bright_white().bold(),
        result.series().missing_count()
    );
    if analysis.read_stats.unparsable > 0 {
        println!(
            "  {} {}",
            "Unparsable values:".bright_yellow(),
            analysis.read_stats.unparsable
        );
    }
    print_rule_executions(result.executions());
    print_flag_summary(&summary);

    if result.all_failed() {
        println!("{}", "No rule completed; the data is unchecked".bright_red().bold());
    }

    println!("  {}", "Outputs:".bright_cyan());
    for path in outputs {
        println!("    {}", path.display());
    }
    println!("  {} {}", "Time:".bright_cyan(), HumanDuration(elapsed));
}

fn print_json(config: &Config, analysis: &StationAnalysis, outputs: &[PathBuf]) -> Result<()> {
    let result = &analysis.result;
    let report = serde_json::json!({
        "station": config.output.station_name,
        "input": analysis.input.path,
        "read": analysis.read_stats,
        "rules": result.executions(),
        "summary": result.summary(),
        "outputs": outputs,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_csv(analysis: &StationAnalysis) {
    let result = &analysis.result;
    let summary = result.summary();
    println!("metric,value");
    println!("samples,{}", summary.total_samples);
    println!("missing,{}", result.series().missing_count());
    println!("flags,{}", summary.total_flags);
    println!("flagged_samples,{}", summary.flagged_samples);
    for (kind, count) in &summary.by_kind {
        println!("flags_{},{}", kind.as_str(), count);
    }
    for (severity, count) in &summary.by_severity {
        println!("severity_{},{}", severity.as_str(), count);
    }
    println!("rule_failures,{}", result.failures().count());
}
