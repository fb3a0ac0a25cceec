//! Stuck (flat-lined) sensor detection.
//!
//! A single forward pass tracks the start of the current run of unchanged
//! values. When the run breaks, on a changed value or a missing sample, every
//! sample of a run at least `window` long is flagged.

use super::{QcRule, RuleConfig, RuleOutput};
use crate::config::StuckConfig;
use crate::constants::{rule_names, MIN_STUCK_WINDOW};
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind};
use crate::series::Series;

#[derive(Debug, Clone)]
pub struct StuckRule {
    config: StuckConfig,
}

impl StuckRule {
    pub fn new(config: StuckConfig) -> Self {
        Self { config }
    }

    fn close_run(&self, run: Option<usize>, end: usize, output: &mut RuleOutput) {
        let Some(start) = run else {
            return;
        };
        let length = end - start;
        if length < self.config.window {
            return;
        }
        for index in start..end {
            output.push_flag(
                index,
                Flag::warning(
                    FlagKind::StuckValue,
                    format!(
                        "value unchanged within {} for {} consecutive samples",
                        self.config.tolerance, length
                    ),
                ),
            );
        }
    }
}

impl QcRule for StuckRule {
    fn name(&self) -> &str {
        rule_names::STUCK_SENSOR
    }

    fn kind(&self) -> FlagKind {
        FlagKind::StuckValue
    }

    fn config(&self) -> RuleConfig {
        RuleConfig::Stuck(self.config.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.config.window < MIN_STUCK_WINDOW {
            return Err(QcError::invalid_rule_config(
                rule_names::STUCK_SENSOR,
                format!(
                    "window must be at least {} samples, got {}",
                    MIN_STUCK_WINDOW, self.config.window
                ),
            ));
        }
        if !self.config.tolerance.is_finite() || self.config.tolerance < 0.0 {
            return Err(QcError::invalid_rule_config(
                rule_names::STUCK_SENSOR,
                format!(
                    "tolerance must be a finite non-negative number, got {}",
                    self.config.tolerance
                ),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, series: &Series) -> Result<RuleOutput> {
        let mut output = RuleOutput::new();
        let mut run_start: Option<usize> = None;
        let mut previous: Option<f64> = None;

        for (index, sample) in series.samples().iter().enumerate() {
            match sample.value {
                None => {
                    self.close_run(run_start.take(), index, &mut output);
                    previous = None;
                }
                Some(value) => {
                    let extends = matches!(
                        (run_start, previous),
                        (Some(_), Some(prev)) if (value - prev).abs() <= self.config.tolerance
                    );
                    if !extends {
                        self.close_run(run_start.take(), index, &mut output);
                        run_start = Some(index);
                    }
                    previous = Some(value);
                }
            }
        }
        self.close_run(run_start, series.len(), &mut output);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::series::test_support::{hourly_series, hourly_values};

    fn rule(window: usize, tolerance: f64) -> StuckRule {
        StuckRule::new(StuckConfig {
            enabled: true,
            window,
            tolerance,
        })
    }

    fn flagged(output: &RuleOutput) -> Vec<usize> {
        output.flags.iter().map(|(i, _)| *i).collect()
    }

    #[test]
    fn test_run_of_exactly_window_flags_all() {
        let series = hourly_values(&[1.0, 2.0, 2.0, 2.0, 2.0, 3.0]);
        let output = rule(4, 0.0).evaluate(&series).unwrap();
        assert_eq!(flagged(&output), vec![1, 2, 3, 4]);
        assert!(output
            .flags
            .iter()
            .all(|(_, f)| f.severity == Severity::Warning && f.kind == FlagKind::StuckValue));
    }

    #[test]
    fn test_run_of_window_minus_one_not_flagged() {
        let series = hourly_values(&[1.0, 2.0, 2.0, 2.0, 3.0]);
        let output = rule(4, 0.0).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_trailing_run_is_flagged() {
        let series = hourly_values(&[5.0, 1.0, 1.0, 1.0]);
        let output = rule(3, 0.0).evaluate(&series).unwrap();
        assert_eq!(flagged(&output), vec![1, 2, 3]);
    }

    #[test]
    fn test_tolerance_extends_run() {
        let series = hourly_values(&[0.5, 0.5005, 0.501, 0.5012, 0.9]);
        let output = rule(4, 0.001).evaluate(&series).unwrap();
        assert_eq!(flagged(&output), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_missing_value_breaks_run() {
        let series = hourly_series(&[
            Some(1.0),
            Some(1.0),
            None,
            Some(1.0),
            Some(1.0),
        ]);
        let output = rule(3, 0.0).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_series_shorter_than_window() {
        let series = hourly_values(&[2.0, 2.0]);
        let output = rule(6, 0.001).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            rule(1, 0.0).validate(),
            Err(QcError::InvalidRuleConfig { .. })
        ));
        assert!(rule(3, -0.1).validate().is_err());
        assert!(rule(3, f64::NAN).validate().is_err());
        assert!(rule(2, 0.0).validate().is_ok());
    }
}
