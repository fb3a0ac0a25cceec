//! Spike detection using the median absolute deviation (MAD).
//!
//! Each sample with a complete centred window is scored with the modified
//! z-score `0.6745 * (v - median) / MAD` of the non-missing window values.
//! Samples whose window cannot fully fit inside the series are not scored.
//! A window with zero MAD carries no scale information and is skipped.

use super::stats::{median, median_absolute_deviation};
use super::{QcRule, RuleConfig, RuleOutput};
use crate::config::SpikeConfig;
use crate::constants::{rule_names, MAD_CONSISTENCY_CONSTANT, MIN_SPIKE_WINDOW};
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind};
use crate::series::Series;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SpikeRule {
    config: SpikeConfig,
}

impl SpikeRule {
    pub fn new(config: SpikeConfig) -> Self {
        Self { config }
    }

    fn half_width(&self) -> usize {
        self.config.window / 2
    }

    /// Minimum non-missing values a window needs to be scored
    pub fn min_valid(&self) -> usize {
        self.config.min_valid.unwrap_or(self.half_width() + 1)
    }

    fn invalid(&self, reason: String) -> QcError {
        QcError::invalid_rule_config(rule_names::SPIKE_MAD, reason)
    }
}

impl QcRule for SpikeRule {
    fn name(&self) -> &str {
        rule_names::SPIKE_MAD
    }

    fn kind(&self) -> FlagKind {
        FlagKind::Spike
    }

    fn config(&self) -> RuleConfig {
        RuleConfig::Spike(self.config.clone())
    }

    fn validate(&self) -> Result<()> {
        let window = self.config.window;
        if window < MIN_SPIKE_WINDOW {
            return Err(self.invalid(format!(
                "window must be at least {}, got {}",
                MIN_SPIKE_WINDOW, window
            )));
        }
        if window % 2 == 0 {
            return Err(self.invalid(format!(
                "window must be odd so it has a centre sample, got {}",
                window
            )));
        }
        if !self.config.threshold.is_finite() || self.config.threshold <= 0.0 {
            return Err(self.invalid(format!(
                "threshold must be a positive number, got {}",
                self.config.threshold
            )));
        }
        let min_valid = self.min_valid();
        if min_valid == 0 || min_valid > window {
            return Err(self.invalid(format!(
                "min_valid must be between 1 and {}, got {}",
                window, min_valid
            )));
        }
        Ok(())
    }

    fn evaluate(&self, series: &Series) -> Result<RuleOutput> {
        let mut output = RuleOutput::new();
        let k = self.half_width();
        let min_valid = self.min_valid();

        if series.len() < self.config.window {
            output.push_warning(format!(
                "series has {} samples, fewer than the window of {}; no samples scored",
                series.len(),
                self.config.window
            ));
            return Ok(output);
        }

        let mut values: Vec<f64> = Vec::with_capacity(self.config.window);
        let mut deviations: Vec<f64> = Vec::with_capacity(self.config.window);
        let mut insufficient = 0usize;
        let mut zero_mad = 0usize;

        for index in k..series.len() - k {
            let Some(value) = series.value(index)? else {
                continue;
            };

            values.clear();
            values.extend(series.window(index, k)?.values());

            if values.len() < min_valid {
                insufficient += 1;
                if self.config.flag_insufficient_data {
                    output.push_flag(
                        index,
                        Flag::info(
                            FlagKind::Spike,
                            format!(
                                "insufficient data: {} of {} window values present, {} required",
                                values.len(),
                                self.config.window,
                                min_valid
                            ),
                        ),
                    );
                }
                continue;
            }

            let Some(center) = median(&mut values) else {
                continue;
            };
            let mad = match median_absolute_deviation(&values, center, &mut deviations) {
                Some(mad) if mad > 0.0 => mad,
                _ => {
                    zero_mad += 1;
                    continue;
                }
            };

            let score = MAD_CONSISTENCY_CONSTANT * (value - center) / mad;
            if score.abs() > self.config.threshold {
                output.push_flag(
                    index,
                    Flag::fail(
                        FlagKind::Spike,
                        format!(
                            "robust z-score {:.2} exceeds {} (median {}, MAD {})",
                            score, self.config.threshold, center, mad
                        ),
                    ),
                );
            }
        }

        if insufficient > 0 {
            debug!(
                "{}: {} windows below min_valid",
                series.metadata().station,
                insufficient
            );
            output.push_warning(format!(
                "{} windows had fewer than {} valid values",
                insufficient, min_valid
            ));
        }
        if zero_mad > 0 {
            debug!("{} windows skipped with zero MAD", zero_mad);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::series::test_support::{hourly_series, hourly_values};

    fn rule(window: usize, threshold: f64) -> SpikeRule {
        SpikeRule::new(SpikeConfig {
            enabled: true,
            window,
            threshold,
            min_valid: None,
            flag_insufficient_data: true,
        })
    }

    fn fails(output: &RuleOutput) -> Vec<usize> {
        output
            .flags
            .iter()
            .filter(|(_, f)| f.severity == Severity::Fail)
            .map(|(i, _)| *i)
            .collect()
    }

    #[test]
    fn test_isolated_spike_flagged() {
        let series = hourly_values(&[0.0, 1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0]);
        let output = rule(5, 3.5).evaluate(&series).unwrap();

        assert_eq!(fails(&output), vec![4]);
        let (_, flag) = &output.flags[0];
        assert_eq!(flag.kind, FlagKind::Spike);
        assert!(flag.reason.contains("robust z-score"));
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_constant_window_never_flags() {
        let series = hourly_values(&[4.0; 12]);
        let output = rule(5, 0.1).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_zero_mad_window_skipped_even_with_outlier() {
        // median 1, deviations [0,0,0,0,9] -> MAD 0
        let series = hourly_values(&[1.0, 1.0, 10.0, 1.0, 1.0]);
        let output = rule(5, 3.5).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_edges_are_not_scored() {
        let series = hourly_values(&[100.0, 1.0, 2.0, 1.5, 2.5, 1.0, 100.0]);
        let output = rule(5, 3.5).evaluate(&series).unwrap();
        assert!(output.flags.iter().all(|(i, _)| *i >= 2 && *i <= 4));
    }

    #[test]
    fn test_missing_centre_skipped() {
        let series = hourly_series(&[
            Some(0.0),
            Some(1.0),
            None,
            Some(3.0),
            Some(4.0),
        ]);
        let output = rule(5, 0.1).evaluate(&series).unwrap();
        assert!(output.flags.iter().all(|(i, _)| *i != 2));
    }

    #[test]
    fn test_insufficient_data_info_flag() {
        let series = hourly_series(&[
            None,
            None,
            Some(5.0),
            None,
            Some(6.0),
        ]);
        let output = rule(5, 3.5).evaluate(&series).unwrap();

        assert_eq!(output.flags.len(), 1);
        let (index, flag) = &output.flags[0];
        assert_eq!(*index, 2);
        assert_eq!(flag.severity, Severity::Info);
        assert!(flag.reason.starts_with("insufficient data"));
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_insufficient_data_flag_can_be_disabled() {
        let series = hourly_series(&[None, None, Some(5.0), None, Some(6.0)]);
        let mut config = rule(5, 3.5).config;
        config.flag_insufficient_data = false;
        let output = SpikeRule::new(config).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_short_series_warns() {
        let series = hourly_values(&[1.0, 2.0]);
        let output = rule(5, 3.5).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            rule(4, 3.5).validate(),
            Err(QcError::InvalidRuleConfig { .. })
        ));
        assert!(rule(1, 3.5).validate().is_err());
        assert!(rule(5, 0.0).validate().is_err());
        assert!(rule(5, -1.0).validate().is_err());

        let mut config = rule(5, 3.5).config;
        config.min_valid = Some(6);
        assert!(SpikeRule::new(config.clone()).validate().is_err());
        config.min_valid = Some(0);
        assert!(SpikeRule::new(config).validate().is_err());

        assert!(rule(9, 6.0).validate().is_ok());
        assert_eq!(rule(9, 6.0).min_valid(), 5);
    }
}
