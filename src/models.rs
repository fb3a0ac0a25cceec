//! Core data structures and types for QC processing.
//!
//! Defines variable kinds, samples, series metadata and the flags that
//! rules attach to individual samples.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::defaults;

/// Hydrological variable measured by a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Rainfall,
    Level,
}

impl VariableKind {
    /// Physically plausible default range for this variable
    pub fn default_range(&self) -> ValidRange {
        let (min, max) = match self {
            VariableKind::Rainfall => defaults::RAINFALL_RANGE,
            VariableKind::Level => defaults::LEVEL_RANGE,
        };
        ValidRange { min, max }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Rainfall => write!(f, "rainfall"),
            VariableKind::Level => write!(f, "level"),
        }
    }
}

/// One timestamped reading; `None` marks a missing value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    pub fn missing(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// Inclusive physically valid value range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Metadata describing one station's single-variable series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesMetadata {
    pub station: String,
    pub variable: String,
    pub kind: VariableKind,
    pub nominal_interval: TimeDelta,
    pub valid_range: ValidRange,
}

impl SeriesMetadata {
    /// Metadata with the variable kind's default range and interval
    pub fn new(station: impl Into<String>, variable: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            station: station.into(),
            variable: variable.into(),
            kind,
            nominal_interval: TimeDelta::seconds(defaults::NOMINAL_INTERVAL_SECONDS),
            valid_range: kind.default_range(),
        }
    }

    pub fn with_nominal_interval(mut self, interval: TimeDelta) -> Self {
        self.nominal_interval = interval;
        self
    }

    pub fn with_valid_range(mut self, min: f64, max: f64) -> Self {
        self.valid_range = ValidRange { min, max };
        self
    }
}

/// Finding category, one per built-in rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlagKind {
    RangeViolation,
    StuckValue,
    Spike,
    StepRateViolation,
}

impl FlagKind {
    pub const ALL: [FlagKind; 4] = [
        FlagKind::RangeViolation,
        FlagKind::StuckValue,
        FlagKind::Spike,
        FlagKind::StepRateViolation,
    ];

    /// Machine-readable identifier used in CSV output
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::RangeViolation => "range",
            FlagKind::StuckValue => "stuck",
            FlagKind::Spike => "spike",
            FlagKind::StepRateViolation => "step_rate",
        }
    }

    /// Human-readable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            FlagKind::RangeViolation => "Range",
            FlagKind::StuckValue => "Stuck sensor",
            FlagKind::Spike => "Spike (MAD)",
            FlagKind::StepRateViolation => "Step rate",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal strength of a finding: Info < Warning < Fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Fail,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Fail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fail => "fail",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single QC finding attached to a sample index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    pub kind: FlagKind,
    pub severity: Severity,
    pub reason: String,
}

impl Flag {
    pub fn new(kind: FlagKind, severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            reason: reason.into(),
        }
    }

    pub fn fail(kind: FlagKind, reason: impl Into<String>) -> Self {
        Self::new(kind, Severity::Fail, reason)
    }

    pub fn warning(kind: FlagKind, reason: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, reason)
    }

    pub fn info(kind: FlagKind, reason: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, reason)
    }
}
