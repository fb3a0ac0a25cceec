//! Output writing for QC results
//!
//! Turns a [`PipelineResult`] into Polars frames and writes them as the
//! flags CSV (one row per flag), the combined CSV (one row per sample) and
//! optionally a combined Parquet file with a typed datetime column. The
//! combined outputs carry the input's other columns through unchanged.
//! The quick-look chart is rendered by [`super::chart`].

use crate::config::OutputConfig;
use crate::constants::{columns, OUTPUT_DATETIME_FORMAT};
use crate::error::{QcError, Result};
use crate::pipeline::result::max_severity;
use crate::pipeline::PipelineResult;
use super::chart;
use super::reader::PassthroughColumn;

use polars::prelude::{
    Column, CsvWriter, DataFrame, DataType, ParquetCompression,
    ParquetWriter as PolarsParquetWriter, SerWriter, StatisticsOptions, TimeUnit,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes QC results to the locations in an [`OutputConfig`]
#[derive(Debug, Clone)]
pub struct QcWriter {
    output: OutputConfig,
}

impl QcWriter {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Write every configured data file, returning the paths written
    pub fn write_all(&self, result: &PipelineResult, passthrough: &[PassthroughColumn]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let mut flags = flags_frame(result)?;
        write_csv(&mut flags, &self.output.flags_csv)?;
        written.push(self.output.flags_csv.clone());

        let mut combined = combined_frame(result, passthrough, false)?;
        write_csv(&mut combined, &self.output.combined_csv)?;
        written.push(self.output.combined_csv.clone());

        if let Some(parquet_path) = &self.output.combined_parquet {
            let mut typed = combined_frame(result, passthrough, true)?;
            write_parquet(&mut typed, parquet_path)?;
            written.push(parquet_path.clone());
        }

        Ok(written)
    }

    /// Render the quick-look chart when a charts directory is configured
    pub fn write_chart(&self, result: &PipelineResult) -> Result<Option<PathBuf>> {
        let Some(path) = self.output.chart_path(&result.series().metadata().variable) else {
            return Ok(None);
        };
        chart::write_chart(result, &path)?;
        Ok(Some(path))
    }

    /// Write the Markdown report to the configured report path
    pub fn write_report(&self, markdown: &str) -> Result<PathBuf> {
        let path = &self.output.report_path;
        ensure_parent(path)?;
        fs::write(path, markdown)?;
        debug!("Wrote report {}", path.display());
        Ok(path.clone())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| QcError::invalid_input(path, format!("Failed to write CSV: {}", e)))?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    PolarsParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(StatisticsOptions::full())
        .finish(df)
        .map_err(|e| QcError::invalid_input(path, format!("Failed to write parquet: {}", e)))?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// One row per flag, ordered by sample index then rule order
pub fn flags_frame(result: &PipelineResult) -> Result<DataFrame> {
    let series = result.series();
    let store = result.store();
    let capacity = store.flag_count();

    let mut indices: Vec<u64> = Vec::with_capacity(capacity);
    let mut timestamps: Vec<String> = Vec::with_capacity(capacity);
    let mut values: Vec<Option<f64>> = Vec::with_capacity(capacity);
    let mut rules: Vec<&str> = Vec::with_capacity(capacity);
    let mut severities: Vec<&str> = Vec::with_capacity(capacity);
    let mut reasons: Vec<&str> = Vec::with_capacity(capacity);

    for (index, flag) in store.flags() {
        let sample = series.sample(index)?;
        indices.push(index as u64);
        timestamps.push(sample.timestamp.format(OUTPUT_DATETIME_FORMAT).to_string());
        values.push(sample.value);
        rules.push(flag.kind.as_str());
        severities.push(flag.severity.as_str());
        reasons.push(flag.reason.as_str());
    }

    Ok(DataFrame::new(vec![
        Column::new(columns::INDEX.into(), indices),
        Column::new(columns::TIMESTAMP.into(), timestamps),
        Column::new(columns::VALUE.into(), values),
        Column::new(columns::RULE.into(), rules),
        Column::new(columns::SEVERITY.into(), severities),
        Column::new(columns::REASON.into(), reasons),
    ])?)
}

const GENERATED_COLUMNS: [&str; 5] = [
    columns::TIMESTAMP,
    columns::VALUE,
    columns::FLAG_COUNT,
    columns::MAX_SEVERITY,
    columns::FLAGS,
];

/// One row per sample with its flag count, highest severity and flag list
///
/// Passthrough columns sit between the value and the QC columns; one whose
/// name clashes with a generated column is dropped. With `typed_time` the
/// timestamp column is a millisecond datetime rather than formatted text.
pub fn combined_frame(
    result: &PipelineResult,
    passthrough: &[PassthroughColumn],
    typed_time: bool,
) -> Result<DataFrame> {
    let store = result.store();
    let samples = result.series().samples();

    let mut counts: Vec<u32> = Vec::with_capacity(samples.len());
    let mut max_severities: Vec<Option<&str>> = Vec::with_capacity(samples.len());
    let mut flag_lists: Vec<String> = Vec::with_capacity(samples.len());

    for index in 0..samples.len() {
        let flags = store.flags_at(index)?;
        counts.push(flags.len() as u32);
        max_severities.push(max_severity(flags).map(|s| s.as_str()));
        flag_lists.push(
            flags
                .iter()
                .map(|f| format!("{}:{}", f.kind, f.severity))
                .collect::<Vec<_>>()
                .join(";"),
        );
    }

    let timestamp = if typed_time {
        let millis: Vec<i64> = samples
            .iter()
            .map(|s| s.timestamp.and_utc().timestamp_millis())
            .collect();
        Column::new(columns::TIMESTAMP.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
    } else {
        let text: Vec<String> = samples
            .iter()
            .map(|s| s.timestamp.format(OUTPUT_DATETIME_FORMAT).to_string())
            .collect();
        Column::new(columns::TIMESTAMP.into(), text)
    };
    let values: Vec<Option<f64>> = samples.iter().map(|s| s.value).collect();

    let mut frame_columns = vec![timestamp, Column::new(columns::VALUE.into(), values)];
    for extra in passthrough {
        if GENERATED_COLUMNS.contains(&extra.name.as_str()) {
            warn!("Input column '{}' clashes with a QC output column, not copied", extra.name);
            continue;
        }
        if extra.values.len() != samples.len() {
            return Err(QcError::configuration(format!(
                "Column '{}' has {} rows but the series has {} samples",
                extra.name,
                extra.values.len(),
                samples.len()
            )));
        }
        frame_columns.push(Column::new(extra.name.as_str().into(), extra.values.clone()));
    }
    frame_columns.extend([
        Column::new(columns::FLAG_COUNT.into(), counts),
        Column::new(columns::MAX_SEVERITY.into(), max_severities),
        Column::new(columns::FLAGS.into(), flag_lists),
    ]);

    Ok(DataFrame::new(frame_columns)?)
}
