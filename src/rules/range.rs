//! Physical range check.

use super::{QcRule, RuleConfig, RuleOutput};
use crate::config::RangeConfig;
use crate::constants::rule_names;
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind, ValidRange};
use crate::series::Series;

/// Fails samples outside the configured or metadata valid range
#[derive(Debug, Clone)]
pub struct RangeRule {
    config: RangeConfig,
}

impl RangeRule {
    pub fn new(config: RangeConfig) -> Self {
        Self { config }
    }

    /// Configured bounds override the series' own valid range
    fn bounds(&self, series: &Series) -> Result<ValidRange> {
        let defaults = series.metadata().valid_range;
        let range = ValidRange {
            min: self.config.min.unwrap_or(defaults.min),
            max: self.config.max.unwrap_or(defaults.max),
        };
        check_bounds(range.min, range.max)?;
        Ok(range)
    }
}

fn check_bounds(min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(QcError::invalid_rule_config(
            rule_names::RANGE_CHECK,
            format!("bounds must be finite (min={}, max={})", min, max),
        ));
    }
    if min > max {
        return Err(QcError::invalid_rule_config(
            rule_names::RANGE_CHECK,
            format!("min {} is greater than max {}", min, max),
        ));
    }
    Ok(())
}

impl QcRule for RangeRule {
    fn name(&self) -> &str {
        rule_names::RANGE_CHECK
    }

    fn kind(&self) -> FlagKind {
        FlagKind::RangeViolation
    }

    fn config(&self) -> RuleConfig {
        RuleConfig::Range(self.config.clone())
    }

    fn validate(&self) -> Result<()> {
        let min = self.config.min.unwrap_or(f64::MIN);
        let max = self.config.max.unwrap_or(f64::MAX);
        check_bounds(min, max)
    }

    fn evaluate(&self, series: &Series) -> Result<RuleOutput> {
        let range = self.bounds(series)?;
        let mut output = RuleOutput::new();

        for (index, sample) in series.samples().iter().enumerate() {
            let Some(value) = sample.value else {
                continue;
            };
            if value < range.min {
                output.push_flag(
                    index,
                    Flag::fail(
                        FlagKind::RangeViolation,
                        format!("value {} below minimum {}", value, range.min),
                    ),
                );
            } else if value > range.max {
                output.push_flag(
                    index,
                    Flag::fail(
                        FlagKind::RangeViolation,
                        format!("value {} above maximum {}", value, range.max),
                    ),
                );
            }
        }

        Ok(output)
    }
}
