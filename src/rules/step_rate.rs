//! Rate-of-change check between adjacent samples.

use super::{QcRule, RuleConfig, RuleOutput};
use crate::config::{parse_interval, StepRateConfig};
use crate::constants::rule_names;
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind};
use crate::series::Series;
use chrono::TimeDelta;

/// Fails a sample whose change from the previous sample is too fast
///
/// The rate is expressed per `per` interval, or per nominal sampling
/// interval when `per` is unset. Pairs involving a missing value or a
/// non-positive time step are skipped.
#[derive(Debug, Clone)]
pub struct StepRateRule {
    config: StepRateConfig,
}

impl StepRateRule {
    pub fn new(config: StepRateConfig) -> Self {
        Self { config }
    }

    fn rate_unit(&self, series: &Series) -> Result<TimeDelta> {
        let unit = match self.config.per.as_deref() {
            Some(text) => parse_interval(text)
                .map_err(|e| QcError::invalid_rule_config(rule_names::STEP_RATE, e.to_string()))?,
            None => series.metadata().nominal_interval,
        };
        if unit <= TimeDelta::zero() {
            return Err(QcError::invalid_rule_config(
                rule_names::STEP_RATE,
                "rate interval must be positive",
            ));
        }
        Ok(unit)
    }
}

fn millis(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64
}

impl QcRule for StepRateRule {
    fn name(&self) -> &str {
        rule_names::STEP_RATE
    }

    fn kind(&self) -> FlagKind {
        FlagKind::StepRateViolation
    }

    fn config(&self) -> RuleConfig {
        RuleConfig::StepRate(self.config.clone())
    }

    fn validate(&self) -> Result<()> {
        if !self.config.max_rate.is_finite() || self.config.max_rate < 0.0 {
            return Err(QcError::invalid_rule_config(
                rule_names::STEP_RATE,
                format!(
                    "max_rate must be a finite non-negative number, got {}",
                    self.config.max_rate
                ),
            ));
        }
        if let Some(per) = self.config.per.as_deref() {
            parse_interval(per)
                .map_err(|e| QcError::invalid_rule_config(rule_names::STEP_RATE, e.to_string()))?;
        }
        Ok(())
    }

    fn evaluate(&self, series: &Series) -> Result<RuleOutput> {
        let unit_ms = millis(self.rate_unit(series)?);
        let max_rate = self.config.max_rate;
        let mut output = RuleOutput::new();
        let mut skipped_time = 0usize;

        for (index, pair) in series.samples().windows(2).enumerate() {
            let (Some(previous), Some(current)) = (pair[0].value, pair[1].value) else {
                continue;
            };
            let elapsed = pair[1].timestamp - pair[0].timestamp;
            if elapsed <= TimeDelta::zero() {
                skipped_time += 1;
                continue;
            }

            // |change| / (elapsed / unit) > max, without dividing first
            let change = (current - previous).abs();
            let elapsed_ms = millis(elapsed);
            if change * unit_ms > max_rate * elapsed_ms {
                let rate = change * unit_ms / elapsed_ms;
                output.push_flag(
                    index + 1,
                    Flag::fail(
                        FlagKind::StepRateViolation,
                        format!(
                            "change of {} over {}s is {:.3} per unit, above {}",
                            current - previous,
                            elapsed.num_seconds(),
                            rate,
                            max_rate
                        ),
                    ),
                );
            }
        }

        if skipped_time > 0 {
            output.push_warning(format!(
                "{} sample pairs skipped with non-positive elapsed time",
                skipped_time
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sample, SeriesMetadata, Severity, VariableKind};
    use crate::series::test_support::{hourly_series, hourly_values};
    use chrono::NaiveDateTime;

    fn rule(max_rate: f64, per: Option<&str>) -> StepRateRule {
        StepRateRule::new(StepRateConfig {
            enabled: true,
            max_rate,
            per: per.map(str::to_string),
        })
    }

    #[test]
    fn test_rate_at_limit_is_valid() {
        let series = hourly_values(&[0.0, 2.0]);
        let output = rule(2.0, Some("1h")).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    fn pair_at(minutes: i64, first: f64, second: f64) -> Series {
        let start = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let samples = vec![
            Sample::new(start, Some(first)),
            Sample::new(start + TimeDelta::minutes(minutes), Some(second)),
        ];
        let metadata = SeriesMetadata::new("s", "level", VariableKind::Level)
            .with_nominal_interval(TimeDelta::minutes(minutes));
        Series::new(metadata, samples)
    }

    #[test]
    fn test_rate_at_limit_with_fractional_spacing() {
        // 0.1 over 20 minutes is exactly 0.3 per hour
        let output = rule(0.3, Some("1h")).evaluate(&pair_at(20, 0.0, 0.1)).unwrap();
        assert!(output.flags.is_empty());

        // 0.7 over 7 minutes is exactly 0.1 per minute
        let output = rule(0.1, Some("1min")).evaluate(&pair_at(7, 0.0, 0.7)).unwrap();
        assert!(output.flags.is_empty());

        // 0.25 over 50 minutes is exactly 0.3 per hour
        let output = rule(0.3, Some("1h")).evaluate(&pair_at(50, 1.0, 1.25)).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_rate_just_above_limit_with_fractional_spacing() {
        let output = rule(0.3, Some("1h")).evaluate(&pair_at(20, 0.0, 0.1001)).unwrap();
        assert_eq!(output.flags.len(), 1);
        assert_eq!(output.flags[0].0, 1);

        let output = rule(0.1, Some("1min")).evaluate(&pair_at(7, 0.0, 0.7001)).unwrap();
        assert_eq!(output.flags.len(), 1);
    }

    #[test]
    fn test_rate_above_limit_flags_later_sample() {
        let series = hourly_values(&[0.0, 2.5, 2.5]);
        let output = rule(2.0, Some("1h")).evaluate(&series).unwrap();
        assert_eq!(output.flags.len(), 1);
        let (index, flag) = &output.flags[0];
        assert_eq!(*index, 1);
        assert_eq!(flag.kind, FlagKind::StepRateViolation);
        assert_eq!(flag.severity, Severity::Fail);
    }

    #[test]
    fn test_negative_changes_use_magnitude() {
        let series = hourly_values(&[5.0, 2.0]);
        let output = rule(2.0, Some("1h")).evaluate(&series).unwrap();
        assert_eq!(output.flags.len(), 1);
    }

    #[test]
    fn test_rate_scales_with_per_interval() {
        // 1.0 per hour is 0.5 per 30 minutes
        let series = hourly_values(&[0.0, 1.0]);
        assert!(rule(0.5, Some("30min")).evaluate(&series).unwrap().flags.is_empty());
        assert_eq!(rule(0.25, Some("30min")).evaluate(&series).unwrap().flags.len(), 1);
    }

    #[test]
    fn test_defaults_to_nominal_interval() {
        // nominal interval of hourly test series is 1h
        let series = hourly_values(&[0.0, 0.25, 1.0]);
        let output = rule(0.5, None).evaluate(&series).unwrap();
        let indices: Vec<usize> = output.flags.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn test_longer_gap_lowers_rate() {
        let start = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let samples = vec![
            Sample::new(start, Some(0.0)),
            Sample::new(start + TimeDelta::hours(4), Some(4.0)),
        ];
        let metadata = SeriesMetadata::new("s", "level", VariableKind::Level)
            .with_nominal_interval(TimeDelta::hours(1));
        let series = Series::new(metadata, samples);

        let output = rule(1.0, None).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_missing_endpoint_skipped() {
        let series = hourly_series(&[Some(0.0), None, Some(100.0)]);
        let output = rule(1.0, Some("1h")).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
    }

    #[test]
    fn test_zero_elapsed_pair_skipped() {
        let ts = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let samples = vec![Sample::new(ts, Some(0.0)), Sample::new(ts, Some(50.0))];
        let series = Series::new(
            SeriesMetadata::new("s", "level", VariableKind::Level),
            samples,
        );

        let output = rule(1.0, Some("1h")).evaluate(&series).unwrap();
        assert!(output.flags.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            rule(-1.0, None).validate(),
            Err(QcError::InvalidRuleConfig { .. })
        ));
        assert!(rule(f64::INFINITY, None).validate().is_err());
        assert!(rule(1.0, Some("often")).validate().is_err());
        assert!(rule(0.0, Some("15min")).validate().is_ok());
    }
}
