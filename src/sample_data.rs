//! Synthetic sample data for trying the toolkit.
//!
//! Generates a water level series with a gentle rising trend and Gaussian
//! noise, a rainfall series with occasional bursts, and a matching TOML
//! configuration. A handful of known defects are injected into the level
//! series so every built-in rule has something to find:
//!
//! | index    | defect                      |
//! |----------|-----------------------------|
//! | 20       | +2.5 m spike                |
//! | 30, 31   | missing values              |
//! | 50       | -1.5 m spike                |
//! | 60..68   | stuck sensor (flat segment) |
//! | 75       | out-of-range reading        |
//! | 85..     | +0.6 m step jump            |
//!
//! Defects beyond the generated length are skipped.

use crate::config::Config;
use crate::constants::{OUTPUT_DATETIME_FORMAT, rule_names, sample};
use crate::error::{QcError, Result};
use crate::models::VariableKind;

use chrono::{Local, NaiveDateTime, TimeDelta};
use polars::prelude::{Column, CsvWriter, DataFrame, SerWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SPIKE_UP: (usize, f64) = (20, 2.5);
const SPIKE_DOWN: (usize, f64) = (50, -1.5);
const MISSING: [usize; 2] = [30, 31];
const STUCK: (usize, usize) = (60, 68);
const OUT_OF_RANGE: (usize, f64) = (75, 12.5);
const STEP_JUMP: (usize, f64) = (85, 0.6);

/// Shape of the generated series
#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub points: usize,
    pub interval_minutes: u32,
    pub start: NaiveDateTime,
    pub seed: u64,
}

impl Default for SampleOptions {
    /// One day of 15-minute data starting at today's midnight
    fn default() -> Self {
        Self {
            points: sample::DEFAULT_POINTS,
            interval_minutes: sample::DEFAULT_INTERVAL_MINUTES,
            start: Local::now().date_naive().and_time(chrono::NaiveTime::MIN),
            seed: sample::DEFAULT_SEED,
        }
    }
}

/// One generated row
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp: NaiveDateTime,
    pub water_level: Option<f64>,
    pub rain: f64,
}

/// Files written by [`init_sample_files`]
#[derive(Debug, Clone)]
pub struct SampleFiles {
    pub data_path: PathBuf,
    pub config_path: PathBuf,
    pub rows: usize,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Timestamp of point `index`, or an error when it leaves chrono's range
fn timestamp_at(options: &SampleOptions, index: usize) -> Result<NaiveDateTime> {
    TimeDelta::try_minutes(i64::from(options.interval_minutes))
        .zip(i32::try_from(index).ok())
        .and_then(|(step, i)| step.checked_mul(i))
        .and_then(|offset| options.start.checked_add_signed(offset))
        .ok_or_else(|| {
            QcError::configuration(format!(
                "Sample point {} at {} minute spacing is outside the supported date range",
                index, options.interval_minutes
            ))
        })
}

/// Generate the synthetic series; identical options give identical rows
///
/// Fails when the requested points and spacing run past the representable
/// date range.
pub fn generate(options: &SampleOptions) -> Result<Vec<SampleRow>> {
    let n = options.points;
    let timestamps = (0..n)
        .map(|i| timestamp_at(options, i))
        .collect::<Result<Vec<_>>>()?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let noise = Normal::new(0.0, sample::NOISE_SD).ok();
    let rain_amount = Gamma::new(sample::RAIN_GAMMA_SHAPE, sample::RAIN_GAMMA_SCALE).ok();

    let mut levels: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let trend = if n > 1 {
                sample::TREND_RISE * i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            let jitter = noise.as_ref().map_or(0.0, |d| d.sample(&mut rng));
            Some(sample::BASE_LEVEL + trend + jitter)
        })
        .collect();

    let mut inject = |index: usize, update: &dyn Fn(f64) -> f64| {
        if let Some(Some(value)) = levels.get_mut(index) {
            *value = update(*value);
        }
    };
    inject(SPIKE_UP.0, &|v| v + SPIKE_UP.1);
    inject(SPIKE_DOWN.0, &|v| v + SPIKE_DOWN.1);
    inject(OUT_OF_RANGE.0, &|_| OUT_OF_RANGE.1);
    for index in STEP_JUMP.0..n {
        inject(index, &|v| v + STEP_JUMP.1);
    }
    if let Some(Some(frozen)) = levels.get(STUCK.0).copied() {
        for level in levels.iter_mut().take(STUCK.1).skip(STUCK.0) {
            *level = Some(frozen);
        }
    }
    for index in MISSING {
        if let Some(level) = levels.get_mut(index) {
            *level = None;
        }
    }

    let mut rain = vec![0.0; n];
    for block_start in (0..n).step_by(sample::RAIN_BLOCK) {
        if rng.r#gen::<f64>() < sample::RAIN_PROBABILITY {
            let burst = rng.gen_range(1..=sample::RAIN_MAX_BURST);
            for slot in rain.iter_mut().skip(block_start).take(burst) {
                *slot = rain_amount.as_ref().map_or(0.0, |d| d.sample(&mut rng));
            }
        }
    }

    Ok(timestamps
        .into_iter()
        .zip(levels.into_iter().zip(rain))
        .map(|(timestamp, (level, rain))| SampleRow {
            timestamp,
            water_level: level.map(round4),
            rain: round4(rain),
        })
        .collect())
}

/// Write rows as `timestamp,water_level_m,rain_mm`; missing levels are empty
pub fn write_sample_csv(rows: &[SampleRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let timestamps: Vec<String> = rows
        .iter()
        .map(|r| r.timestamp.format(OUTPUT_DATETIME_FORMAT).to_string())
        .collect();
    let levels: Vec<Option<f64>> = rows.iter().map(|r| r.water_level).collect();
    let rain: Vec<f64> = rows.iter().map(|r| r.rain).collect();

    let mut df = DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new(sample::LEVEL_COLUMN.into(), levels),
        Column::new(sample::RAIN_COLUMN.into(), rain),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| QcError::invalid_input(path, format!("Failed to write CSV: {}", e)))?;
    debug!("Wrote {} sample rows to {}", rows.len(), path.display());
    Ok(())
}

/// Configuration matching the generated water level data
pub fn sample_config(data_path: &Path, interval_minutes: u32) -> Config {
    let mut config = Config::default()
        .with_input(data_path.to_path_buf())
        .with_station_name(sample::STATION_NAME);

    config.data.value_column = sample::LEVEL_COLUMN.to_string();
    config.data.datetime_format = Some(OUTPUT_DATETIME_FORMAT.to_string());
    config.data.variable_kind = VariableKind::Level;
    config.data.nominal_interval = Some(format!("{}min", interval_minutes));
    config.qc.range_check.min = Some(0.0);
    config.qc.range_check.max = Some(10.0);
    config.output.charts_dir = config.output.report_path.parent().map(Path::to_path_buf);
    config.qc.order = rule_names::DEFAULT_ORDER
        .iter()
        .map(|s| s.to_string())
        .collect();
    config
}

/// Write `data.csv` and `config.toml` into `dir`
///
/// Existing files are left untouched unless `overwrite` is set.
pub fn init_sample_files(dir: &Path, options: &SampleOptions, overwrite: bool) -> Result<SampleFiles> {
    if options.interval_minutes == 0 {
        return Err(QcError::configuration("Sample interval must be at least one minute"));
    }

    let data_path = dir.join(sample::DATA_FILE_NAME);
    let config_path = dir.join(crate::constants::CONFIG_FILE_NAME);

    if !overwrite {
        if let Some(existing) = [&data_path, &config_path].into_iter().find(|p| p.exists()) {
            return Err(QcError::configuration(format!(
                "{} already exists; use --overwrite to replace it",
                existing.display()
            )));
        }
    }

    info!(
        "Generating {} points at {} minute spacing (seed {})",
        options.points, options.interval_minutes, options.seed
    );
    let rows = generate(options)?;
    write_sample_csv(&rows, &data_path)?;

    let config = sample_config(&data_path, options.interval_minutes);
    fs::write(&config_path, config.to_toml_string()?)?;
    info!("Wrote {} and {}", data_path.display(), config_path.display());

    Ok(SampleFiles {
        data_path,
        config_path,
        rows: rows.len(),
    })
}
