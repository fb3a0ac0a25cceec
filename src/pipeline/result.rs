//! Pipeline run results and flag statistics.

use crate::models::{Flag, FlagKind, Severity};
use crate::series::{Series, TimeSeriesStore};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one rule within a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    Completed,
    /// Rule parameters were rejected; the rule did not run
    InvalidConfig { reason: String },
    /// Rule returned an error, panicked or emitted unusable flags
    Failed { message: String },
}

impl RuleStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RuleStatus::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RuleStatus::Completed => "completed",
            RuleStatus::InvalidConfig { .. } => "invalid config",
            RuleStatus::Failed { .. } => "failed",
        }
    }

    /// Reason or message for a rule that did not complete
    pub fn detail(&self) -> Option<&str> {
        match self {
            RuleStatus::Completed => None,
            RuleStatus::InvalidConfig { reason } => Some(reason),
            RuleStatus::Failed { message } => Some(message),
        }
    }
}

/// Per-rule execution metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleExecution {
    pub rule: String,
    pub kind: FlagKind,
    #[serde(flatten)]
    pub status: RuleStatus,
    pub flags_raised: usize,
    pub warnings: Vec<String>,
}

/// Flag counts for reporting
///
/// Every flag is counted in `by_kind` and `by_severity`; a sample carrying
/// both a Warning and a Fail contributes to both severities there, and only
/// to `Fail` in `samples_by_max_severity`. Info flags are also counted
/// in `info_by_kind`, so findings can be told apart from notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagSummary {
    pub total_samples: usize,
    pub total_flags: usize,
    pub flagged_samples: usize,
    pub by_kind: BTreeMap<FlagKind, usize>,
    pub info_by_kind: BTreeMap<FlagKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub samples_by_max_severity: BTreeMap<Severity, usize>,
}

impl FlagSummary {
    pub fn from_store(store: &TimeSeriesStore) -> Self {
        let mut summary = Self {
            total_samples: store.len(),
            by_kind: FlagKind::ALL.iter().map(|k| (*k, 0)).collect(),
            info_by_kind: FlagKind::ALL.iter().map(|k| (*k, 0)).collect(),
            by_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
            samples_by_max_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
            ..Default::default()
        };

        for index in 0..store.len() {
            let flags = store.flags_at(index).unwrap_or_default();
            let Some(max) = max_severity(flags) else {
                continue;
            };
            summary.flagged_samples += 1;
            *summary.samples_by_max_severity.entry(max).or_default() += 1;

            for flag in flags {
                summary.total_flags += 1;
                *summary.by_kind.entry(flag.kind).or_default() += 1;
                *summary.by_severity.entry(flag.severity).or_default() += 1;
                if flag.severity == Severity::Info {
                    *summary.info_by_kind.entry(flag.kind).or_default() += 1;
                }
            }
        }

        summary
    }

    pub fn clean_samples(&self) -> usize {
        self.total_samples - self.flagged_samples
    }

    pub fn kind_count(&self, kind: FlagKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn info_count(&self, kind: FlagKind) -> usize {
        self.info_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Warning and Fail flags of `kind`
    pub fn finding_count(&self, kind: FlagKind) -> usize {
        self.kind_count(kind) - self.info_count(kind)
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Highest severity among `flags`, `None` when there are none
pub fn max_severity(flags: &[Flag]) -> Option<Severity> {
    flags.iter().map(|f| f.severity).max()
}

/// Series, attached flags and per-rule metadata of one pipeline run
///
/// Contains no timing information, so two runs over the same input and
/// registry compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    store: TimeSeriesStore,
    executions: Vec<RuleExecution>,
}

impl PipelineResult {
    pub(crate) fn new(store: TimeSeriesStore, executions: Vec<RuleExecution>) -> Self {
        Self { store, executions }
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn series(&self) -> &Series {
        self.store.series()
    }

    pub fn executions(&self) -> &[RuleExecution] {
        &self.executions
    }

    pub fn execution(&self, rule: &str) -> Option<&RuleExecution> {
        self.executions.iter().find(|e| e.rule == rule)
    }

    /// Executions that did not complete
    pub fn failures(&self) -> impl Iterator<Item = &RuleExecution> {
        self.executions.iter().filter(|e| !e.status.is_completed())
    }

    pub fn all_failed(&self) -> bool {
        !self.executions.is_empty() && self.executions.iter().all(|e| !e.status.is_completed())
    }

    pub fn summary(&self) -> FlagSummary {
        FlagSummary::from_store(&self.store)
    }

    pub fn into_store(self) -> TimeSeriesStore {
        self.store
    }
}
