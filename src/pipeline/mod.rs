//! QC pipeline execution.
//!
//! Runs every registered rule against one series and merges their findings
//! into a fresh [`TimeSeriesStore`]. A rule that is misconfigured, returns an
//! error or panics is recorded in the run metadata and the remaining rules
//! still run; a pipeline run always produces a [`PipelineResult`].
//!
//! Rules can be evaluated sequentially ([`QcPipeline::run`]) or on blocking
//! worker threads ([`QcPipeline::run_concurrent`]). Flags are always
//! attached serially in registry order, so both modes produce identical
//! results.

pub mod result;

#[cfg(test)]
pub mod tests;

pub use result::{FlagSummary, PipelineResult, RuleExecution, RuleStatus};

use crate::error::QcError;
use crate::rules::{QcRule, RuleOutput, RuleRegistry};
use crate::series::{Series, TimeSeriesStore};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

/// What happened when a rule was asked to evaluate
#[derive(Debug)]
enum Evaluation {
    Invalid(String),
    Failed(String),
    Output(RuleOutput),
}

/// Executes a rule registry against series
#[derive(Debug, Clone)]
pub struct QcPipeline {
    registry: Arc<RuleRegistry>,
}

impl QcPipeline {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Evaluate all rules one after another on the calling thread
    pub fn run(&self, series: Series) -> PipelineResult {
        self.run_shared(Arc::new(series))
    }

    pub fn run_shared(&self, series: Arc<Series>) -> PipelineResult {
        let mut store = TimeSeriesStore::from_shared(series);
        let mut executions = Vec::with_capacity(self.registry.len());

        for rule in self.registry.iter() {
            let evaluation = evaluate(rule.as_ref(), store.series());
            executions.push(apply(&mut store, rule.as_ref(), evaluation));
        }

        finish(store, executions)
    }

    /// Evaluate every rule on its own blocking worker
    pub async fn run_concurrent(&self, series: Series) -> PipelineResult {
        self.run_concurrent_shared(Arc::new(series)).await
    }

    pub async fn run_concurrent_shared(&self, series: Arc<Series>) -> PipelineResult {
        let handles: Vec<_> = self
            .registry
            .iter()
            .map(|rule| {
                let rule = Arc::clone(rule);
                let series = Arc::clone(&series);
                task::spawn_blocking(move || evaluate(rule.as_ref(), &series))
            })
            .collect();

        let mut store = TimeSeriesStore::from_shared(series);
        let mut executions = Vec::with_capacity(handles.len());

        for (rule, handle) in self.registry.iter().zip(handles) {
            let evaluation = match handle.await {
                Ok(evaluation) => evaluation,
                Err(e) if e.is_panic() => Evaluation::Failed(panic_message(e.into_panic())),
                Err(e) => Evaluation::Failed(format!("worker task did not finish: {}", e)),
            };
            executions.push(apply(&mut store, rule.as_ref(), evaluation));
        }

        finish(store, executions)
    }
}

fn finish(store: TimeSeriesStore, executions: Vec<RuleExecution>) -> PipelineResult {
    let failed = executions.iter().filter(|e| !e.status.is_completed()).count();
    info!(
        "QC run for {}: {} rules, {} flags, {} rule failures",
        store.series().metadata().station,
        executions.len(),
        store.flag_count(),
        failed
    );
    PipelineResult::new(store, executions)
}

/// Validate then evaluate a rule, turning errors and panics into values
fn evaluate(rule: &dyn QcRule, series: &Series) -> Evaluation {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        rule.validate()?;
        rule.evaluate(series)
    }));

    match outcome {
        Ok(Ok(output)) => Evaluation::Output(output),
        Ok(Err(QcError::InvalidRuleConfig { reason, .. })) => Evaluation::Invalid(reason),
        Ok(Err(e)) => Evaluation::Failed(e.to_string()),
        Err(payload) => Evaluation::Failed(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("rule panicked: {}", detail)
}

/// Attach a rule's flags to the store and describe the execution
///
/// Flags are only attached when every index is inside the series, so a
/// rule either contributes all of its flags or none.
fn apply(store: &mut TimeSeriesStore, rule: &dyn QcRule, evaluation: Evaluation) -> RuleExecution {
    let name = rule.name().to_string();
    let kind = rule.kind();

    let failed = |status: RuleStatus| RuleExecution {
        rule: name.clone(),
        kind,
        status,
        flags_raised: 0,
        warnings: Vec::new(),
    };

    let output = match evaluation {
        Evaluation::Output(output) => output,
        Evaluation::Invalid(reason) => {
            warn!("Rule '{}' skipped, invalid configuration: {}", name, reason);
            return failed(RuleStatus::InvalidConfig { reason });
        }
        Evaluation::Failed(message) => {
            warn!("Rule '{}' failed: {}", name, message);
            return failed(RuleStatus::Failed { message });
        }
    };

    let len = store.len();
    if let Some((index, _)) = output.flags.iter().find(|(index, _)| *index >= len) {
        let message = QcError::IndexOutOfRange { index: *index, len }.to_string();
        warn!("Rule '{}' discarded: {}", name, message);
        return RuleExecution {
            warnings: output.warnings,
            ..failed(RuleStatus::Failed { message })
        };
    }

    let flags_raised = output.flags.len();
    for (index, flag) in output.flags {
        if let Err(e) = store.add_flag(index, flag) {
            return failed(RuleStatus::Failed {
                message: e.to_string(),
            });
        }
    }

    for warning in &output.warnings {
        warn!("Rule '{}': {}", name, warning);
    }
    debug!("Rule '{}' raised {} flags", name, flags_raised);

    RuleExecution {
        rule: name,
        kind,
        status: RuleStatus::Completed,
        flags_raised,
        warnings: output.warnings,
    }
}
