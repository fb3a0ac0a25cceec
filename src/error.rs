//! Error handling for QC operations.
//!
//! Provides error types with context for series access, rule configuration,
//! input parsing and output writing failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid configuration for rule '{rule}': {reason}")]
    InvalidRuleConfig { rule: String, reason: String },

    #[error("Rule '{rule}' failed: {message}")]
    RuleFailed { rule: String, message: String },

    #[error("Rule '{name}' is already registered")]
    DuplicateRule { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input file: {path} - {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Duplicate timestamp {timestamp} in file: {path}")]
    DuplicateTimestamp { path: PathBuf, timestamp: String },

    #[error("Cannot parse timestamp '{value}' in file: {path} (row {row})")]
    TimestampParse {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl QcError {
    /// Create an invalid rule configuration error
    pub fn invalid_rule_config(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRuleConfig {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create a rule failure error
    pub fn rule_failed(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleFailed {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QcError>;
