//! End-to-end runs of the built-in rules

use super::pipeline_from;
use crate::config::QcRulesConfig;
use crate::models::{FlagKind, Severity};
use crate::pipeline::RuleStatus;
use crate::series::test_support::{hourly_series, hourly_values};

fn only(rule: &str) -> QcRulesConfig {
    QcRulesConfig {
        order: vec![rule.to_string()],
        ..Default::default()
    }
}

#[test]
fn test_spike_scenario_flags_only_the_spike() {
    let mut config = only("spike_mad");
    config.spike_mad.window = 5;
    config.spike_mad.threshold = 3.5;

    let series = hourly_values(&[0.0, 1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0]);
    let result = pipeline_from(&config).run(series);

    let flagged: Vec<usize> = result.store().flagged_indices().collect();
    assert_eq!(flagged, vec![4]);
    let flags = result.store().flags_at(4).unwrap();
    assert_eq!(flags[0].kind, FlagKind::Spike);
    assert_eq!(flags[0].severity, Severity::Fail);
}

#[test]
fn test_stuck_scenario_flags_whole_series() {
    let mut config = only("stuck_sensor");
    config.stuck_sensor.window = 4;
    config.stuck_sensor.tolerance = 0.0;

    let result = pipeline_from(&config).run(hourly_values(&[5.0; 6]));

    let flagged: Vec<usize> = result.store().flagged_indices().collect();
    assert_eq!(flagged, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(result.execution("stuck_sensor").unwrap().flags_raised, 6);
}

#[test]
fn test_even_spike_window_disables_spike_only() {
    let mut config = QcRulesConfig::default();
    config.spike_mad.window = 4;
    config.stuck_sensor.window = 3;
    config.stuck_sensor.tolerance = 0.0;
    config.step_rate.max_rate = 1.0;

    // out of range at 0, flat run 2..=4, jump at 5
    let series = hourly_values(&[12.0, 1.0, 2.0, 2.0, 2.0, 5.0, 5.5]);
    let result = pipeline_from(&config).run(series);

    let spike = result.execution("spike_mad").unwrap();
    assert!(matches!(spike.status, RuleStatus::InvalidConfig { .. }));
    assert_eq!(spike.flags_raised, 0);

    for rule in ["range_check", "stuck_sensor", "step_rate"] {
        let execution = result.execution(rule).unwrap();
        assert_eq!(execution.status, RuleStatus::Completed, "{}", rule);
        assert!(execution.flags_raised > 0, "{}", rule);
    }

    let summary = result.summary();
    assert_eq!(summary.kind_count(FlagKind::Spike), 0);
    assert!(summary.kind_count(FlagKind::RangeViolation) >= 1);
    assert_eq!(summary.kind_count(FlagKind::StuckValue), 3);
    assert!(summary.kind_count(FlagKind::StepRateViolation) >= 1);
}

#[test]
fn test_missing_samples_never_flagged_by_numeric_rules() {
    let mut config = QcRulesConfig::default();
    config.spike_mad.window = 3;
    config.spike_mad.threshold = 0.5;
    config.stuck_sensor.window = 2;
    config.step_rate.max_rate = 0.1;

    let series = hourly_series(&[
        Some(1.0),
        None,
        Some(50.0),
        Some(1.0),
        None,
        Some(1.0),
        Some(1.0),
        None,
        Some(-3.0),
    ]);
    let result = pipeline_from(&config).run(series);

    for index in [1, 4, 7] {
        assert!(
            result.store().flags_at(index).unwrap().is_empty(),
            "missing sample {} carries flags",
            index
        );
    }
    assert!(result.store().flag_count() > 0);
}

#[test]
fn test_flags_accumulate_across_rules() {
    let mut config = QcRulesConfig::default();
    config.step_rate.max_rate = 1.0;
    config.step_rate.per = Some("1h".to_string());

    // 20.0 breaks both range and step rate
    let series = hourly_values(&[1.0, 20.0, 1.5]);
    let result = pipeline_from(&config).run(series);

    let kinds: Vec<FlagKind> = result
        .store()
        .flags_at(1)
        .unwrap()
        .iter()
        .map(|f| f.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![FlagKind::RangeViolation, FlagKind::StepRateViolation]
    );
}

#[test]
fn test_run_is_deterministic() {
    let config = QcRulesConfig::default();
    let values: Vec<f64> = (0..200)
        .map(|i| {
            let base = (i as f64 / 10.0).sin() + 2.0;
            if i % 37 == 0 { base + 5.0 } else { base }
        })
        .collect();

    let pipeline = pipeline_from(&config);
    let first = pipeline.run(hourly_values(&values));
    let second = pipeline.run(hourly_values(&values));
    assert_eq!(first, second);
}
