//! Application constants for hydro_qc
//!
//! This module contains default values, statistical constants and column
//! names used throughout the QC toolkit.

// =============================================================================
// Statistical Constants
// =============================================================================

/// Scale factor turning a MAD-normalised deviation into a robust z-score.
///
/// 0.6745 is the 0.75 quantile of the standard normal distribution, so
/// `0.6745 * (x - median) / MAD` is comparable to an ordinary z-score for
/// normally distributed data (Iglewicz & Hoaglin modified z-score).
pub const MAD_CONSISTENCY_CONSTANT: f64 = 0.6745;

/// Smallest MAD window width that can describe a neighbourhood
pub const MIN_SPIKE_WINDOW: usize = 3;

/// Shortest run that can meaningfully be called "stuck"
pub const MIN_STUCK_WINDOW: usize = 2;

// =============================================================================
// Rule Names
// =============================================================================

/// Registry names of the built-in rules, matching their config sections
pub mod rule_names {
    pub const RANGE_CHECK: &str = "range_check";
    pub const STUCK_SENSOR: &str = "stuck_sensor";
    pub const SPIKE_MAD: &str = "spike_mad";
    pub const STEP_RATE: &str = "step_rate";

    /// Default evaluation order
    pub const DEFAULT_ORDER: &[&str] = &[RANGE_CHECK, STUCK_SENSOR, SPIKE_MAD, STEP_RATE];
}

// =============================================================================
// Rule Defaults
// =============================================================================

pub mod defaults {
    pub const STUCK_WINDOW: usize = 6;
    pub const STUCK_TOLERANCE: f64 = 0.001;

    pub const SPIKE_WINDOW: usize = 9;
    pub const SPIKE_THRESHOLD: f64 = 6.0;

    pub const STEP_MAX_RATE: f64 = 0.3;

    /// Physically plausible water level range in metres
    pub const LEVEL_RANGE: (f64, f64) = (0.0, 10.0);

    /// Physically plausible rainfall accumulation per sample in millimetres
    pub const RAINFALL_RANGE: (f64, f64) = (0.0, 300.0);

    /// Nominal sampling interval when neither config nor data provides one
    pub const NOMINAL_INTERVAL_SECONDS: i64 = 15 * 60;
}

// =============================================================================
// Input Parsing
// =============================================================================

/// Strings treated as "no value" in input CSV files
pub const DEFAULT_MISSING_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "-9999"];

/// Timestamp formats tried in order when no explicit format is configured
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
];

/// Format used for timestamps in all CSV outputs
pub const OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Output Columns
// =============================================================================

pub mod columns {
    pub const INDEX: &str = "index";
    pub const TIMESTAMP: &str = "timestamp";
    pub const VALUE: &str = "value";
    pub const RULE: &str = "rule";
    pub const SEVERITY: &str = "severity";
    pub const REASON: &str = "reason";
    pub const FLAG_COUNT: &str = "qc_flag_count";
    pub const MAX_SEVERITY: &str = "qc_max_severity";
    pub const FLAGS: &str = "qc_flags";
}

// =============================================================================
// Runtime
// =============================================================================

/// Default number of stations processed concurrently in batch mode
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, 8)
}

/// Config file name looked up under the user config directory
pub const CONFIG_DIR_NAME: &str = "hydro-qc";
pub const CONFIG_FILE_NAME: &str = "config.toml";

// =============================================================================
// Sample Data
// =============================================================================

pub mod sample {
    pub const DATA_FILE_NAME: &str = "data.csv";
    pub const STATION_NAME: &str = "Creek XYZ - Node 01";
    pub const LEVEL_COLUMN: &str = "water_level_m";
    pub const RAIN_COLUMN: &str = "rain_mm";

    pub const DEFAULT_POINTS: usize = 96;
    pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;
    pub const DEFAULT_SEED: u64 = 42;

    pub const BASE_LEVEL: f64 = 0.8;
    pub const TREND_RISE: f64 = 0.3;
    pub const NOISE_SD: f64 = 0.02;

    /// Rain bursts may start every this many samples
    pub const RAIN_BLOCK: usize = 16;
    pub const RAIN_PROBABILITY: f64 = 0.4;
    pub const RAIN_MAX_BURST: usize = 4;
    pub const RAIN_GAMMA_SHAPE: f64 = 1.5;
    pub const RAIN_GAMMA_SCALE: f64 = 2.0;
}
