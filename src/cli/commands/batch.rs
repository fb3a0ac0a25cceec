//! Multi-station batch command
//!
//! Discovers station CSV files with a glob, QCs them in parallel and writes
//! each station's outputs to its own directory under the output root.

use super::shared::load_config;
use crate::cli::args::{BatchArgs, OutputFormat};
use crate::processor::discovery::FileDiscovery;
use crate::processor::{BatchStats, StationProcessor};
use anyhow::{Context, Result, bail};
use colored::*;
use indicatif::HumanDuration;
use std::time::Duration;
use tracing::info;

pub async fn run_batch(args: BatchArgs) -> Result<()> {
    args.validate()?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(jobs) = args.jobs {
        config = config.with_workers(jobs);
    }
    if args.concurrent {
        config = config.with_concurrent(true);
    }
    config.validate().context("Invalid configuration")?;

    let inputs = FileDiscovery::new(args.inputs.clone())
        .discover()
        .context("Failed to discover input files")?;
    if inputs.is_empty() {
        bail!("No CSV files matched '{}'", args.inputs);
    }
    info!("Discovered {} station files", inputs.len());

    if args.output_format == OutputFormat::Human {
        println!(
            "{} {} stations -> {}",
            "Starting batch QC:".bright_green().bold(),
            inputs.len().to_string().bright_white().bold(),
            args.output_dir.display()
        );
    }

    let processor = StationProcessor::new(config)?.with_progress(args.show_progress());
    let stats = processor.process_batch(inputs, &args.output_dir).await;

    match args.output_format {
        OutputFormat::Human => print_human(&stats),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Csv => print_csv(&stats),
    }

    if stats.stations_processed == 0 {
        bail!("All {} stations failed", stats.stations_failed);
    }
    Ok(())
}

fn print_human(stats: &BatchStats) {
    println!("\n{}", "Batch Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Stations processed:".bright_cyan(),
        stats.stations_processed.to_string().bright_white().bold()
    );
    if stats.stations_failed > 0 {
        println!(
            "  {} {}",
            "Stations failed:".bright_red(),
            stats.stations_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Samples checked:".bright_cyan(),
        stats.total_samples.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Flags raised:".bright_cyan(),
        stats.total_flags.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Time:".bright_cyan(),
        HumanDuration(Duration::from_millis(stats.processing_time_ms as u64))
    );

    for failure in &stats.failures {
        println!(
            "  {} {} ({}): {}",
            "x".bright_red().bold(),
            failure.station,
            failure.input.display(),
            failure.error
        );
    }
}

fn print_csv(stats: &BatchStats) {
    println!("metric,value");
    println!("stations_processed,{}", stats.stations_processed);
    println!("stations_failed,{}", stats.stations_failed);
    println!("total_samples,{}", stats.total_samples);
    println!("total_flags,{}", stats.total_flags);
    println!("processing_time_ms,{}", stats.processing_time_ms);
}
