//! Hydrological time series quality control
//!
//! A library and CLI for rule-based QC of water level and rainfall series.
//!
//! This library provides tools for:
//! - Reading single-variable series from CSV with configurable columns,
//!   timestamp formats and missing-value sentinels
//! - A registry of QC rules (range, stuck sensor, MAD spike, step rate)
//!   evaluated in a fixed order over an immutable series
//! - A pipeline that contains rule failures and records per-rule execution
//!   status instead of aborting
//! - Flag, combined CSV/Parquet and Markdown report outputs
//! - Parallel multi-station batch processing

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod rules;
pub mod sample_data;
pub mod series;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::Config;
pub use error::{QcError, Result};
pub use models::{Flag, FlagKind, Sample, SeriesMetadata, Severity, VariableKind};
pub use pipeline::{PipelineResult, QcPipeline, RuleExecution, RuleStatus};
pub use processor::StationProcessor;
pub use rules::{QcRule, RuleRegistry};
pub use series::{Series, TimeSeriesStore};
