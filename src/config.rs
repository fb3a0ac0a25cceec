//! Configuration management and validation.
//!
//! Provides configuration structures for input parsing, per-rule QC
//! parameters, pipeline execution and output locations. Configuration is
//! stored as TOML; every section falls back to defaults when omitted.
//!
//! Rule-specific semantic checks (odd MAD windows, ordered bounds, ...)
//! are left to the rules themselves; a bad rule section only disables
//! that rule.

use crate::constants::{self, defaults, rule_names};
use crate::error::{QcError, Result};
use crate::models::VariableKind;
use chrono::TimeDelta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static INTERVAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(s|secs?|seconds?|m|mins?|minutes?|h|hrs?|hours?|d|days?)\s*$")
        .expect("interval pattern is valid")
});

/// Parse a sampling interval such as `15min`, `1h`, `30s` or `1d`
pub fn parse_interval(text: &str) -> Result<TimeDelta> {
    let captures = INTERVAL_PATTERN.captures(text).ok_or_else(|| {
        QcError::configuration(format!(
            "Invalid interval '{}': expected <number><unit> with unit s, min, h or d",
            text
        ))
    })?;

    let amount: i64 = captures[1]
        .parse()
        .map_err(|_| QcError::configuration(format!("Interval amount too large: '{}'", text)))?;
    if amount == 0 {
        return Err(QcError::configuration(format!(
            "Interval must be positive: '{}'",
            text
        )));
    }

    let unit = captures[2].to_lowercase();
    let seconds_per_unit = match unit.chars().next() {
        Some('s') => 1,
        Some('m') => 60,
        Some('h') => 3_600,
        _ => 86_400,
    };

    amount
        .checked_mul(seconds_per_unit)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| QcError::configuration(format!("Interval out of range: '{}'", text)))
}

/// Input data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file holding the series
    pub input_csv: PathBuf,

    /// Name of the timestamp column
    pub time_column: String,

    /// Name of the value column to QC
    pub value_column: String,

    /// chrono format string; common ISO layouts are tried when unset
    pub datetime_format: Option<String>,

    /// Kind of variable held in `value_column`
    pub variable_kind: VariableKind,

    /// Nominal sampling interval (e.g. "15min"); inferred from data when unset
    pub nominal_interval: Option<String>,

    /// Lower physical bound; defaults by variable kind
    pub valid_min: Option<f64>,

    /// Upper physical bound; defaults by variable kind
    pub valid_max: Option<f64>,

    /// Cell contents read as missing values
    pub missing_values: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_csv: PathBuf::from("data.csv"),
            time_column: "timestamp".to_string(),
            value_column: "value".to_string(),
            datetime_format: None,
            variable_kind: VariableKind::Level,
            nominal_interval: None,
            valid_min: None,
            valid_max: None,
            missing_values: constants::DEFAULT_MISSING_VALUES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DataConfig {
    /// Configured nominal interval, if any
    pub fn nominal_interval(&self) -> Result<Option<TimeDelta>> {
        self.nominal_interval
            .as_deref()
            .map(parse_interval)
            .transpose()
    }
}

/// Range check parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub enabled: bool,
    /// Overrides the series' valid minimum when set
    pub min: Option<f64>,
    /// Overrides the series' valid maximum when set
    pub max: Option<f64>,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min: None,
            max: None,
        }
    }
}

/// Stuck sensor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckConfig {
    pub enabled: bool,
    /// Minimum run length (samples) reported as stuck
    pub window: usize,
    /// Largest adjacent change still considered "unchanged"
    pub tolerance: f64,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: defaults::STUCK_WINDOW,
            tolerance: defaults::STUCK_TOLERANCE,
        }
    }
}

/// MAD spike detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub enabled: bool,
    /// Centred window width in samples; must be odd
    pub window: usize,
    /// Robust z-score above which a sample is a spike
    pub threshold: f64,
    /// Minimum non-missing values per window; defaults to half-width + 1
    pub min_valid: Option<usize>,
    /// Emit an Info flag where a window has too few values
    pub flag_insufficient_data: bool,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: defaults::SPIKE_WINDOW,
            threshold: defaults::SPIKE_THRESHOLD,
            min_valid: None,
            flag_insufficient_data: true,
        }
    }
}

/// Step-rate parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepRateConfig {
    pub enabled: bool,
    /// Largest allowed absolute change per `per` interval
    pub max_rate: f64,
    /// Rate time unit (e.g. "1h"); the series' nominal interval when unset
    pub per: Option<String>,
}

impl Default for StepRateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rate: defaults::STEP_MAX_RATE,
            per: None,
        }
    }
}

/// All rule sections plus their evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcRulesConfig {
    /// Registry order of the rules; unknown names are rejected
    pub order: Vec<String>,
    pub range_check: RangeConfig,
    pub stuck_sensor: StuckConfig,
    pub spike_mad: SpikeConfig,
    pub step_rate: StepRateConfig,
}

impl Default for QcRulesConfig {
    fn default() -> Self {
        Self {
            order: rule_names::DEFAULT_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect(),
            range_check: RangeConfig::default(),
            stuck_sensor: StuckConfig::default(),
            spike_mad: SpikeConfig::default(),
            step_rate: StepRateConfig::default(),
        }
    }
}

/// Pipeline execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Evaluate rules on parallel worker threads
    pub concurrent: bool,
    /// Stations processed at once in batch mode
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            workers: constants::default_workers(),
        }
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub station_name: String,
    pub flags_csv: PathBuf,
    pub combined_csv: PathBuf,
    pub combined_parquet: Option<PathBuf>,
    pub report_path: PathBuf,
    /// Directory for the quick-look PNG chart; no chart when unset
    pub charts_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            station_name: "station".to_string(),
            flags_csv: PathBuf::from("out/flags.csv"),
            combined_csv: PathBuf::from("out/qc_output.csv"),
            combined_parquet: None,
            report_path: PathBuf::from("out/summary.md"),
            charts_dir: None,
        }
    }
}

impl OutputConfig {
    /// Same file names placed under `dir`
    pub fn relocated(&self, dir: &Path) -> Self {
        let place = |path: &Path, fallback: &str| -> PathBuf {
            dir.join(path.file_name().unwrap_or_else(|| fallback.as_ref()))
        };
        Self {
            station_name: self.station_name.clone(),
            flags_csv: place(&self.flags_csv, "flags.csv"),
            combined_csv: place(&self.combined_csv, "qc_output.csv"),
            combined_parquet: self
                .combined_parquet
                .as_deref()
                .map(|p| place(p, "qc_output.parquet")),
            report_path: place(&self.report_path, "summary.md"),
            charts_dir: self.charts_dir.as_ref().map(|_| dir.to_path_buf()),
        }
    }

    /// Chart location for `variable`, when charts are enabled
    pub fn chart_path(&self, variable: &str) -> Option<PathBuf> {
        self.charts_dir
            .as_ref()
            .map(|dir| dir.join(crate::processor::chart::chart_file_name(variable)))
    }

    /// Every file this configuration writes
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = vec![
            self.flags_csv.as_path(),
            self.combined_csv.as_path(),
            self.report_path.as_path(),
        ];
        if let Some(parquet) = &self.combined_parquet {
            paths.push(parquet.as_path());
        }
        paths
    }
}

/// Top-level QC configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub qc: QcRulesConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            QcError::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<user config dir>/hydro-qc/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| QcError::configuration("Could not determine user config directory"))?;
        Ok(base
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Structural validation; rule semantics are checked by each rule
    pub fn validate(&self) -> Result<()> {
        if self.data.time_column.trim().is_empty() {
            return Err(QcError::configuration("data.time_column must not be empty"));
        }
        if self.data.value_column.trim().is_empty() {
            return Err(QcError::configuration("data.value_column must not be empty"));
        }
        if self.data.time_column == self.data.value_column {
            return Err(QcError::configuration(
                "data.time_column and data.value_column must differ",
            ));
        }
        self.data.nominal_interval()?;

        if self.pipeline.workers == 0 {
            return Err(QcError::configuration("pipeline.workers must be at least 1"));
        }

        for name in &self.qc.order {
            if !rule_names::DEFAULT_ORDER.contains(&name.as_str()) {
                return Err(QcError::configuration(format!(
                    "Unknown rule '{}' in qc.order (known: {})",
                    name,
                    rule_names::DEFAULT_ORDER.join(", ")
                )));
            }
        }

        if self.output.station_name.trim().is_empty() {
            return Err(QcError::configuration("output.station_name must not be empty"));
        }
        let paths = self.output.paths();
        for (i, path) in paths.iter().enumerate() {
            if path.as_os_str().is_empty() {
                return Err(QcError::configuration("Output paths must not be empty"));
            }
            if paths[..i].contains(path) {
                return Err(QcError::configuration(format!(
                    "Output path '{}' is used more than once",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    pub fn with_input(mut self, input: PathBuf) -> Self {
        self.data.input_csv = input;
        self
    }

    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.output = self.output.relocated(dir);
        self
    }

    pub fn with_station_name(mut self, name: impl Into<String>) -> Self {
        self.output.station_name = name.into();
        self
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.pipeline.concurrent = concurrent;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pipeline.workers = workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("15min").unwrap(), TimeDelta::minutes(15));
        assert_eq!(parse_interval("1h").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_interval("30 s").unwrap(), TimeDelta::seconds(30));
        assert_eq!(parse_interval("2 days").unwrap(), TimeDelta::days(2));
        assert_eq!(parse_interval("5M").unwrap(), TimeDelta::minutes(5));
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("fifteen minutes").is_err());
        assert!(parse_interval("0min").is_err());
        assert!(parse_interval("-5min").is_err());
        assert!(parse_interval("10 weeks").is_err());
    }

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.qc.order.len(), 4);
        assert!(config.qc.spike_mad.enabled);
        assert_eq!(config.qc.spike_mad.window, defaults::SPIKE_WINDOW);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [data]
            input_csv = "examples/data.csv"
            value_column = "water_level_m"
            variable_kind = "level"
            nominal_interval = "15min"

            [qc.spike_mad]
            window = 5
            threshold = 3.5

            [qc.step_rate]
            enabled = false
        "#;
        let config = Config::from_toml_str(text).unwrap();

        assert_eq!(config.data.value_column, "water_level_m");
        assert_eq!(config.data.time_column, "timestamp");
        assert_eq!(
            config.data.nominal_interval().unwrap(),
            Some(TimeDelta::minutes(15))
        );
        assert_eq!(config.qc.spike_mad.window, 5);
        assert!(config.qc.spike_mad.flag_insufficient_data);
        assert!(!config.qc.step_rate.enabled);
        assert_eq!(config.qc.stuck_sensor.window, defaults::STUCK_WINDOW);
    }

    #[test]
    fn test_even_spike_window_is_not_a_config_error() {
        let mut config = Config::default();
        config.qc.spike_mad.window = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_structural_errors() {
        let mut config = Config::default();
        config.data.value_column = "timestamp".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.qc.order.push("humidity_check".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.combined_csv = config.output.flags_csv.clone();
        assert!(config.validate().is_err());

        let config = Config::default().with_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_and_load() {
        let config = Config::default()
            .with_station_name("Creek XYZ - Node 01")
            .with_concurrent(true);
        let text = config.to_toml_string().unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_relocated_output_keeps_file_names() {
        let output = OutputConfig {
            combined_parquet: Some(PathBuf::from("out/qc.parquet")),
            ..Default::default()
        };
        let moved = output.relocated(Path::new("/tmp/station-a"));
        assert_eq!(moved.flags_csv, PathBuf::from("/tmp/station-a/flags.csv"));
        assert_eq!(
            moved.combined_parquet,
            Some(PathBuf::from("/tmp/station-a/qc.parquet"))
        );
        assert_eq!(moved.report_path, PathBuf::from("/tmp/station-a/summary.md"));
        assert_eq!(moved.charts_dir, None);
        assert_eq!(moved.chart_path("water_level_m"), None);
    }

    #[test]
    fn test_charts_follow_output_dir() {
        let output: OutputConfig = toml::from_str("charts_dir = \"plots\"").unwrap();
        assert_eq!(
            output.chart_path("water_level_m"),
            Some(PathBuf::from("plots/water_level_m_qc.png"))
        );

        let moved = output.relocated(Path::new("/tmp/station-a"));
        assert_eq!(
            moved.chart_path("rain_mm"),
            Some(PathBuf::from("/tmp/station-a/rain_mm_qc.png"))
        );
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let result = Config::load(Path::new("/nonexistent/hydro-qc.toml"));
        assert!(matches!(result, Err(QcError::Configuration { .. })));
    }
}
