//! Pipeline tests
//!
//! Exercise the pipeline against the built-in rules and against small
//! purpose-built rules that misbehave in controlled ways.

pub mod scenarios;

use crate::config::QcRulesConfig;
use crate::error::{QcError, Result};
use crate::models::{Flag, FlagKind};
use crate::pipeline::QcPipeline;
use crate::rules::{QcRule, RuleConfig, RuleOutput, RuleRegistry};
use crate::series::Series;
use std::sync::Arc;

/// Pipeline with the built-in rules built from `config`
pub fn pipeline_from(config: &QcRulesConfig) -> QcPipeline {
    let registry = RuleRegistry::from_config(config).unwrap();
    QcPipeline::new(Arc::new(registry))
}

pub fn pipeline_with(rules: Vec<Arc<dyn QcRule>>) -> QcPipeline {
    let mut registry = RuleRegistry::new();
    for rule in rules {
        registry.register_shared(rule).unwrap();
    }
    QcPipeline::new(Arc::new(registry))
}

/// How a [`TestRule`] behaves when evaluated
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Flag the given indices with a Warning
    FlagAt(Vec<usize>),
    ReturnError,
    Panic,
    InvalidConfig,
}

#[derive(Debug, Clone)]
pub struct TestRule {
    pub name: String,
    pub behaviour: Behaviour,
}

impl TestRule {
    pub fn new(name: &str, behaviour: Behaviour) -> Arc<dyn QcRule> {
        Arc::new(Self {
            name: name.to_string(),
            behaviour,
        })
    }
}

impl QcRule for TestRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FlagKind {
        FlagKind::StuckValue
    }

    fn config(&self) -> RuleConfig {
        RuleConfig::Custom {
            description: format!("{:?}", self.behaviour),
        }
    }

    fn validate(&self) -> Result<()> {
        match self.behaviour {
            Behaviour::InvalidConfig => Err(QcError::invalid_rule_config(
                self.name.clone(),
                "test rule is misconfigured",
            )),
            _ => Ok(()),
        }
    }

    fn evaluate(&self, _series: &Series) -> Result<RuleOutput> {
        match &self.behaviour {
            Behaviour::FlagAt(indices) => Ok(RuleOutput {
                flags: indices
                    .iter()
                    .map(|i| (*i, Flag::warning(FlagKind::StuckValue, "test flag")))
                    .collect(),
                warnings: vec![],
            }),
            Behaviour::ReturnError => Err(QcError::rule_failed(self.name.clone(), "sensor table missing")),
            Behaviour::Panic => panic!("test rule exploded"),
            Behaviour::InvalidConfig => Ok(RuleOutput::new()),
        }
    }
}
