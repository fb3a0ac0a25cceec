//! CSV ingestion into QC series.
//!
//! Reads the configured time and value columns with Polars (every column
//! as text), parses timestamps and values, maps missing-value sentinels to
//! `None`, sorts by time and rejects duplicate timestamps. The resulting
//! [`Series`] satisfies the strictly-increasing timestamp invariant the
//! rules rely on. Every other input column is kept as text, in the same
//! row order, so it can be written back alongside the QC results.

use crate::config::DataConfig;
use crate::constants::{self, OUTPUT_DATETIME_FORMAT};
use crate::error::{QcError, Result};
use crate::models::{Sample, SeriesMetadata, ValidRange};
use crate::series::Series;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use polars::prelude::{CsvReadOptions, DataFrame, DataType, SerReader};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Counters describing what the reader did with the input rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadStats {
    pub rows: usize,
    /// Empty cells and configured sentinels
    pub missing: usize,
    /// Cells that were neither sentinels nor finite numbers
    pub unparsable: usize,
    /// Rows that were out of time order in the file
    pub reordered: bool,
    pub inferred_interval: bool,
}

/// An input column that is not part of the QC series
#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// A series loaded from disk together with its read statistics
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: Series,
    pub stats: ReadStats,
    /// Remaining input columns, aligned with the series samples
    pub passthrough: Vec<PassthroughColumn>,
}

/// Reads single-variable series from CSV files
#[derive(Debug, Clone)]
pub struct CsvSeriesReader {
    data: DataConfig,
    missing: HashSet<String>,
}

impl CsvSeriesReader {
    pub fn new(data: DataConfig) -> Self {
        let missing = data
            .missing_values
            .iter()
            .map(|s| s.trim().to_string())
            .collect();
        Self { data, missing }
    }

    /// Read `path` as the series of `station`
    pub fn read(&self, path: &Path, station: &str) -> Result<LoadedSeries> {
        if !path.is_file() {
            return Err(QcError::invalid_input(path, "file does not exist"));
        }
        debug!("Reading {} for station {}", path.display(), station);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let timestamps = self.text_column(&df, &self.data.time_column, path)?;
        let values = self.text_column(&df, &self.data.value_column, path)?;
        let mut passthrough = df
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|c| *c != self.data.time_column && *c != self.data.value_column)
            .map(|name| {
                let values = self.text_column(&df, &name, path)?;
                Ok(PassthroughColumn { name, values })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut stats = ReadStats {
            rows: df.height(),
            ..Default::default()
        };
        let mut samples = Vec::with_capacity(df.height());

        for (row, (time_cell, value_cell)) in timestamps.into_iter().zip(values).enumerate() {
            let time_text = time_cell.unwrap_or_default();
            let timestamp = parse_timestamp(&time_text, self.data.datetime_format.as_deref())
                .ok_or_else(|| QcError::TimestampParse {
                    path: path.to_path_buf(),
                    // header is line 1
                    row: row + 2,
                    value: time_text.clone(),
                })?;

            let value = self.parse_value(value_cell.as_deref(), &mut stats);
            samples.push(Sample::new(timestamp, value));
        }

        if !samples.is_sorted_by_key(|s| s.timestamp) {
            stats.reordered = true;
            warn!("{}: rows are not in time order, sorting", path.display());
            let mut order: Vec<usize> = (0..samples.len()).collect();
            order.sort_by_key(|&i| samples[i].timestamp);
            samples = order.iter().map(|&i| samples[i]).collect();
            for column in &mut passthrough {
                column.values = order.iter().map(|&i| column.values[i].clone()).collect();
            }
        }
        if let Some(pair) = samples.windows(2).find(|p| p[0].timestamp == p[1].timestamp) {
            return Err(QcError::DuplicateTimestamp {
                path: path.to_path_buf(),
                timestamp: pair[0].timestamp.format(OUTPUT_DATETIME_FORMAT).to_string(),
            });
        }

        let nominal_interval = match self.data.nominal_interval()? {
            Some(interval) => interval,
            None => {
                stats.inferred_interval = true;
                infer_interval(&samples)
            }
        };

        let kind = self.data.variable_kind;
        let defaults = kind.default_range();
        let valid_range = ValidRange {
            min: self.data.valid_min.unwrap_or(defaults.min),
            max: self.data.valid_max.unwrap_or(defaults.max),
        };

        let metadata = SeriesMetadata::new(station, self.data.value_column.clone(), kind)
            .with_nominal_interval(nominal_interval)
            .with_valid_range(valid_range.min, valid_range.max);

        if stats.unparsable > 0 {
            warn!(
                "{}: {} values could not be parsed and were treated as missing",
                path.display(),
                stats.unparsable
            );
        }
        debug!(
            "Loaded {} samples ({} missing) from {}",
            samples.len(),
            stats.missing + stats.unparsable,
            path.display()
        );

        Ok(LoadedSeries {
            series: Series::new(metadata, samples),
            stats,
            passthrough,
        })
    }

    /// Column `name` as owned optional strings
    fn text_column(&self, df: &DataFrame, name: &str, path: &Path) -> Result<Vec<Option<String>>> {
        let column = df.column(name).map_err(|_| {
            let found: Vec<String> = df
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect();
            QcError::invalid_input(
                path,
                format!("missing column '{}' (found: {})", name, found.join(", ")),
            )
        })?;
        let column = column.cast(&DataType::String)?;
        let text = column.as_materialized_series().str()?;
        Ok(text
            .into_iter()
            .map(|cell| cell.map(str::to_string))
            .collect())
    }

    fn parse_value(&self, cell: Option<&str>, stats: &mut ReadStats) -> Option<f64> {
        let text = cell.map(str::trim).unwrap_or_default();
        if text.is_empty() || self.missing.contains(text) {
            stats.missing += 1;
            return None;
        }
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            Ok(_) => {
                stats.missing += 1;
                None
            }
            Err(_) => {
                stats.unparsable += 1;
                None
            }
        }
    }
}

/// Parse a timestamp with `format`, or with the common layouts when unset
///
/// Date-only values are read as midnight.
pub fn parse_timestamp(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let formats: Vec<&str> = match format {
        Some(format) => vec![format],
        None => constants::DATETIME_FORMATS.to_vec(),
    };

    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    })
}

/// Median positive spacing between samples
fn infer_interval(samples: &[Sample]) -> TimeDelta {
    let mut spacings: Vec<TimeDelta> = samples
        .windows(2)
        .map(|p| p[1].timestamp - p[0].timestamp)
        .filter(|d| *d > TimeDelta::zero())
        .collect();

    if spacings.is_empty() {
        return TimeDelta::seconds(constants::defaults::NOMINAL_INTERVAL_SECONDS);
    }
    spacings.sort();
    spacings[spacings.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VariableKind;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn level_config() -> DataConfig {
        DataConfig {
            value_column: "water_level_m".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 15, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:15:00", None), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:15:00", None), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:15", None), Some(expected));
        assert_eq!(
            parse_timestamp("01/03/2024 12:15", Some("%d/%m/%Y %H:%M")),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2024-03-01", Some("%Y-%m-%d")),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday", None), None);
        assert_eq!(parse_timestamp("", None), None);
    }

    #[test]
    fn test_read_with_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "station.csv",
            "timestamp,water_level_m,rain_mm\n\
             2024-01-01 00:00:00,0.80,0\n\
             2024-01-01 00:15:00,,0\n\
             2024-01-01 00:30:00,NA,0\n\
             2024-01-01 00:45:00,-9999,0\n\
             2024-01-01 01:00:00,bogus,0\n\
             2024-01-01 01:15:00,0.85,1.2\n",
        );

        let loaded = CsvSeriesReader::new(level_config())
            .read(&path, "creek")
            .unwrap();
        let series = &loaded.series;

        assert_eq!(series.len(), 6);
        assert_eq!(series.value(0).unwrap(), Some(0.80));
        assert_eq!(series.value(5).unwrap(), Some(0.85));
        assert_eq!(series.missing_count(), 4);
        assert_eq!(loaded.stats.missing, 3);
        assert_eq!(loaded.stats.unparsable, 1);
        assert_eq!(series.metadata().station, "creek");
        assert_eq!(series.metadata().variable, "water_level_m");
        assert_eq!(series.metadata().nominal_interval, TimeDelta::minutes(15));
        assert!(loaded.stats.inferred_interval);

        assert_eq!(loaded.passthrough.len(), 1);
        assert_eq!(loaded.passthrough[0].name, "rain_mm");
        assert_eq!(loaded.passthrough[0].values[5].as_deref(), Some("1.2"));
    }

    #[test]
    fn test_rows_are_sorted() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "unsorted.csv",
            "timestamp,water_level_m,note\n\
             2024-01-01 02:00:00,3,c\n\
             2024-01-01 00:00:00,1,a\n\
             2024-01-01 01:00:00,2,b\n",
        );

        let loaded = CsvSeriesReader::new(level_config())
            .read(&path, "s")
            .unwrap();
        let values: Vec<Option<f64>> = loaded.series.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert!(loaded.stats.reordered);

        // extra columns follow their rows
        let notes: Vec<Option<&str>> = loaded.passthrough[0]
            .values
            .iter()
            .map(|v| v.as_deref())
            .collect();
        assert_eq!(notes, vec![Some("a"), Some("b"), Some("c")]);
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "dupes.csv",
            "timestamp,water_level_m\n\
             2024-01-01 00:00:00,1\n\
             2024-01-01 00:00:00,2\n",
        );

        let result = CsvSeriesReader::new(level_config()).read(&path, "s");
        assert!(matches!(result, Err(QcError::DuplicateTimestamp { .. })));
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "timestamp,water_level_m\n\
             2024-01-01 00:00:00,1\n\
             not-a-date,2\n",
        );

        match CsvSeriesReader::new(level_config()).read(&path, "s") {
            Err(QcError::TimestampParse { row, value, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected TimestampParse, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "cols.csv", "timestamp,level\n2024-01-01 00:00:00,1\n");

        match CsvSeriesReader::new(level_config()).read(&path, "s") {
            Err(QcError::InvalidInput { reason, .. }) => {
                assert!(reason.contains("water_level_m"));
                assert!(reason.contains("level"));
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_configured_interval_and_range() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "rain.csv",
            "time,rain_mm\n2024-01-01 00:00,0.0\n2024-01-01 00:05,1.5\n",
        );
        let config = DataConfig {
            time_column: "time".to_string(),
            value_column: "rain_mm".to_string(),
            variable_kind: VariableKind::Rainfall,
            nominal_interval: Some("5min".to_string()),
            valid_max: Some(50.0),
            ..Default::default()
        };

        let loaded = CsvSeriesReader::new(config).read(&path, "gauge").unwrap();
        let metadata = loaded.series.metadata();
        assert_eq!(metadata.kind, VariableKind::Rainfall);
        assert_eq!(metadata.nominal_interval, TimeDelta::minutes(5));
        assert_eq!(metadata.valid_range, ValidRange { min: 0.0, max: 50.0 });
        assert!(!loaded.stats.inferred_interval);
    }

    #[test]
    fn test_nonexistent_file() {
        let result = CsvSeriesReader::new(level_config()).read(Path::new("/no/such/file.csv"), "s");
        assert!(matches!(result, Err(QcError::InvalidInput { .. })));
    }

    #[test]
    fn test_infer_interval_uses_median_spacing() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let samples: Vec<Sample> = [0, 15, 30, 45, 120, 135]
            .iter()
            .map(|m| Sample::new(start + TimeDelta::minutes(*m), Some(1.0)))
            .collect();
        assert_eq!(infer_interval(&samples), TimeDelta::minutes(15));
        assert_eq!(
            infer_interval(&samples[..1]),
            TimeDelta::seconds(constants::defaults::NOMINAL_INTERVAL_SECONDS)
        );
    }
}
