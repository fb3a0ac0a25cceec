//! QC rule interface and registry.
//!
//! Every check implements [`QcRule`]: a pure function from an immutable
//! [`Series`] to a list of `(index, Flag)` findings. Rules never see flags
//! raised by other rules and never write to the store; the pipeline owns
//! flag attachment.
//!
//! The [`RuleRegistry`] is an ordered list built once (usually with
//! [`RuleRegistry::from_config`]) and handed to the pipeline behind an `Arc`.

pub mod range;
pub mod spike;
pub mod stats;
pub mod step_rate;
pub mod stuck;

pub use range::RangeRule;
pub use spike::SpikeRule;
pub use step_rate::StepRateRule;
pub use stuck::StuckRule;

use crate::config::{QcRulesConfig, RangeConfig, SpikeConfig, StepRateConfig, StuckConfig};
use crate::constants::rule_names;
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind};
use crate::series::Series;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// A single quality-control check
pub trait QcRule: Send + Sync + Debug {
    /// Registry name, unique within a registry
    fn name(&self) -> &str;

    /// Kind of flag this rule raises
    fn kind(&self) -> FlagKind;

    /// Parameters the rule was built with
    fn config(&self) -> RuleConfig;

    /// Check parameters before evaluation
    fn validate(&self) -> Result<()>;

    /// Evaluate the rule; must not depend on anything but `series`
    fn evaluate(&self, series: &Series) -> Result<RuleOutput>;
}

/// Findings and non-fatal notes produced by one rule evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutput {
    pub flags: Vec<(usize, Flag)>,
    pub warnings: Vec<String>,
}

impl RuleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_flag(&mut self, index: usize, flag: Flag) {
        self.flags.push((index, flag));
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Parameters of a rule, tagged by rule type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    Range(RangeConfig),
    Stuck(StuckConfig),
    Spike(SpikeConfig),
    StepRate(StepRateConfig),
    /// Rules outside the built-in set describe themselves in free text
    Custom { description: String },
}

/// Ordered collection of rules, evaluated in registration order
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<(String, Arc<dyn QcRule>)>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the enabled built-in rules in the configured order
    pub fn from_config(config: &QcRulesConfig) -> Result<Self> {
        let mut registry = Self::new();

        for name in &config.order {
            let rule: Option<Arc<dyn QcRule>> = match name.as_str() {
                rule_names::RANGE_CHECK => config
                    .range_check
                    .enabled
                    .then(|| Arc::new(RangeRule::new(config.range_check.clone())) as Arc<dyn QcRule>),
                rule_names::STUCK_SENSOR => config
                    .stuck_sensor
                    .enabled
                    .then(|| Arc::new(StuckRule::new(config.stuck_sensor.clone())) as Arc<dyn QcRule>),
                rule_names::SPIKE_MAD => config
                    .spike_mad
                    .enabled
                    .then(|| Arc::new(SpikeRule::new(config.spike_mad.clone())) as Arc<dyn QcRule>),
                rule_names::STEP_RATE => config
                    .step_rate
                    .enabled
                    .then(|| Arc::new(StepRateRule::new(config.step_rate.clone())) as Arc<dyn QcRule>),
                other => {
                    return Err(QcError::configuration(format!(
                        "Unknown rule '{}' in qc.order",
                        other
                    )));
                }
            };

            match rule {
                Some(rule) => registry.register_shared(rule)?,
                None => debug!("Rule '{}' disabled in configuration", name),
            }
        }

        Ok(registry)
    }

    /// Register a rule; names must be unique
    pub fn register<R: QcRule + 'static>(&mut self, rule: R) -> Result<()> {
        self.register_shared(Arc::new(rule))
    }

    pub fn register_shared(&mut self, rule: Arc<dyn QcRule>) -> Result<()> {
        let name = rule.name().to_string();
        if self.contains(&name) {
            return Err(QcError::DuplicateRule { name });
        }
        debug!("Registered rule '{}' ({})", name, rule.kind());
        self.rules.push((name, rule));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn QcRule>> {
        self.rules.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Rules in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn QcRule>> {
        self.rules.iter().map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
