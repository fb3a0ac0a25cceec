//! Station processing engine.
//!
//! Runs the complete QC workflow for one or many stations: read the CSV
//! series, run the QC pipeline, write flag/combined outputs, the optional
//! quick-look chart and the Markdown report. Batch runs process stations concurrently with bounded
//! parallelism; one failing station never aborts the batch.

pub mod chart;
pub mod discovery;
pub mod reader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::StationInput;
use self::reader::{CsvSeriesReader, PassthroughColumn, ReadStats};
use self::writer::QcWriter;

use crate::config::{Config, OutputConfig};
use crate::error::Result;
use crate::pipeline::{FlagSummary, PipelineResult, QcPipeline};
use crate::report::{self, ReportContext};
use crate::rules::RuleRegistry;

use chrono::Local;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, error, info};

/// A station's series after the QC pipeline has run
#[derive(Debug, Clone)]
pub struct StationAnalysis {
    pub input: StationInput,
    pub read_stats: ReadStats,
    /// Input columns other than time and value, in series order
    pub passthrough: Vec<PassthroughColumn>,
    pub result: PipelineResult,
}

/// What was produced for one station
#[derive(Debug, Clone, Serialize)]
pub struct StationOutcome {
    pub station: String,
    pub input: PathBuf,
    pub samples: usize,
    pub summary: FlagSummary,
    pub rule_failures: usize,
    pub outputs: Vec<PathBuf>,
}

/// A station that could not be processed
#[derive(Debug, Clone, Serialize)]
pub struct StationFailure {
    pub station: String,
    pub input: PathBuf,
    pub error: String,
}

/// Aggregate statistics of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub stations_processed: usize,
    pub stations_failed: usize,
    pub total_samples: usize,
    pub total_flags: usize,
    pub failures: Vec<StationFailure>,
    pub processing_time_ms: u128,
}

/// Runs read, QC, write and report for stations
#[derive(Debug, Clone)]
pub struct StationProcessor {
    config: Arc<Config>,
    pipeline: QcPipeline,
    reader: CsvSeriesReader,
    show_progress: bool,
}

impl StationProcessor {
    /// Validate the configuration and build the rule registry once
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let registry = RuleRegistry::from_config(&config.qc)?;
        debug!("Rule registry: {}", registry.names().join(", "));

        Ok(Self {
            reader: CsvSeriesReader::new(config.data.clone()),
            pipeline: QcPipeline::new(Arc::new(registry)),
            config: Arc::new(config),
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &QcPipeline {
        &self.pipeline
    }

    /// Read a station's series and run the QC pipeline on it
    pub async fn analyze(&self, input: &StationInput) -> Result<StationAnalysis> {
        let reader = self.reader.clone();
        let path = input.path.clone();
        let station = input.station.clone();
        let loaded = task::spawn_blocking(move || reader.read(&path, &station)).await??;

        let result = if self.config.pipeline.concurrent {
            self.pipeline.run_concurrent(loaded.series).await
        } else {
            let pipeline = self.pipeline.clone();
            task::spawn_blocking(move || pipeline.run(loaded.series)).await?
        };

        Ok(StationAnalysis {
            input: input.clone(),
            read_stats: loaded.stats,
            passthrough: loaded.passthrough,
            result,
        })
    }

    /// Write data files and the report for an analysed station
    pub fn write_outputs(&self, analysis: &StationAnalysis, output: &OutputConfig) -> Result<Vec<PathBuf>> {
        let writer = QcWriter::new(output.clone());
        let mut written = writer.write_all(&analysis.result, &analysis.passthrough)?;

        let mut context = ReportContext::new(output.station_name.clone(), Local::now().naive_local())
            .with_source(analysis.input.path.clone())
            .with_read_stats(analysis.read_stats.clone());
        if let Some(chart) = writer.write_chart(&analysis.result)? {
            context = context.with_chart(report::chart_link(&chart, &output.report_path));
            written.push(chart);
        }
        let markdown = report::render(&analysis.result, &context);
        written.push(writer.write_report(&markdown)?);

        Ok(written)
    }

    /// Output locations for `station` under `output_root`
    pub fn station_output(&self, station: &str, output_root: &Path) -> OutputConfig {
        let mut output = self.config.output.relocated(&output_root.join(station));
        output.station_name = station.to_string();
        output
    }

    /// Analyse one station and write its outputs under `output_root/<station>`
    pub async fn process_station(&self, input: StationInput, output_root: &Path) -> Result<StationOutcome> {
        let analysis = self.analyze(&input).await?;
        let output = self.station_output(&input.station, output_root);

        let processor = self.clone();
        task::spawn_blocking(move || -> Result<StationOutcome> {
            let outputs = processor.write_outputs(&analysis, &output)?;
            let summary = analysis.result.summary();
            Ok(StationOutcome {
                station: analysis.input.station.clone(),
                input: analysis.input.path.clone(),
                samples: analysis.result.series().len(),
                rule_failures: analysis.result.failures().count(),
                summary,
                outputs,
            })
        })
        .await?
    }

    /// Process all stations with at most `pipeline.workers` in flight
    pub async fn process_batch(&self, inputs: Vec<StationInput>, output_root: &Path) -> BatchStats {
        let start_time = Instant::now();
        let total = inputs.len();
        let workers = self.config.pipeline.workers.max(1).min(total.max(1));
        info!("Processing {} stations with {} workers", total, workers);

        let pb = if self.show_progress {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message("Processing stations");
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut stats = stream::iter(inputs)
            .map(|input| {
                let pb = pb.clone();
                async move {
                    pb.set_message(format!("QC: {}", input.station));
                    let failure_input = input.clone();
                    let result = self.process_station(input, output_root).await;
                    pb.inc(1);
                    result.map_err(|e| {
                        error!("Failed to process {}: {:#}", failure_input.path.display(), e);
                        StationFailure {
                            station: failure_input.station,
                            input: failure_input.path,
                            error: e.to_string(),
                        }
                    })
                }
            })
            .buffer_unordered(workers)
            .fold(BatchStats::default(), |mut stats, result| async move {
                match result {
                    Ok(outcome) => {
                        debug!(
                            "{}: {} samples, {} flags",
                            outcome.station, outcome.samples, outcome.summary.total_flags
                        );
                        stats.stations_processed += 1;
                        stats.total_samples += outcome.samples;
                        stats.total_flags += outcome.summary.total_flags;
                    }
                    Err(failure) => {
                        stats.stations_failed += 1;
                        stats.failures.push(failure);
                    }
                }
                stats
            })
            .await;

        pb.finish_with_message("All stations processed");

        stats.failures.sort_by(|a, b| a.station.cmp(&b.station));
        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Batch complete: {} processed, {} failed, {} flags",
            stats.stations_processed, stats.stations_failed, stats.total_flags
        );
        stats
    }
}
