//! One-page Markdown QC summary.
//!
//! Counts every flag by kind and by severity, and separately counts samples
//! by the highest severity they carry, so nothing is hidden when one sample
//! has flags of several severities.

use crate::constants::OUTPUT_DATETIME_FORMAT;
use crate::models::{FlagKind, Severity};
use crate::pipeline::{PipelineResult, RuleStatus};
use crate::processor::reader::ReadStats;
use chrono::{NaiveDateTime, TimeDelta};
use std::path::{Path, PathBuf};

/// Run details that are not part of the pipeline result
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub station: String,
    pub source: Option<PathBuf>,
    pub generated_at: NaiveDateTime,
    pub read_stats: Option<ReadStats>,
    /// Chart location as linked from the report
    pub chart: Option<PathBuf>,
}

impl ReportContext {
    pub fn new(station: impl Into<String>, generated_at: NaiveDateTime) -> Self {
        Self {
            station: station.into(),
            source: None,
            generated_at,
            read_stats: None,
            chart: None,
        }
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_read_stats(mut self, stats: ReadStats) -> Self {
        self.read_stats = Some(stats);
        self
    }

    pub fn with_chart(mut self, chart: PathBuf) -> Self {
        self.chart = Some(chart);
        self
    }
}

/// Link to `chart` as seen from the report file, relative when the chart
/// sits under the report's directory
pub fn chart_link(chart: &Path, report_path: &Path) -> PathBuf {
    report_path
        .parent()
        .and_then(|dir| chart.strip_prefix(dir).ok())
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| chart.to_path_buf())
}

/// Compact interval text such as `15min`, `1h` or `90s`
pub fn format_interval(interval: TimeDelta) -> String {
    let seconds = interval.num_seconds();
    match seconds {
        s if s > 0 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s > 0 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s > 0 && s % 60 == 0 => format!("{}min", s / 60),
        s => format!("{}s", s),
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Render the Markdown summary of one pipeline run
pub fn render(result: &PipelineResult, context: &ReportContext) -> String {
    let series = result.series();
    let metadata = series.metadata();
    let summary = result.summary();
    let total = series.len();
    let format_time = |t: Option<NaiveDateTime>| {
        t.map(|t| t.format(OUTPUT_DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| "n/a".to_string())
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# QC Summary: {}", context.station));
    lines.push(String::new());
    lines.push(format!(
        "Generated: {}",
        context.generated_at.format(OUTPUT_DATETIME_FORMAT)
    ));
    lines.push(String::new());

    lines.push("## Dataset".to_string());
    if let Some(source) = &context.source {
        lines.push(format!("- Source: `{}`", source.display()));
    }
    lines.push(format!("- Variable: {} ({})", metadata.variable, metadata.kind));
    lines.push(format!("- Samples: {}", total));
    lines.push(format!("- Start: {}", format_time(series.start())));
    lines.push(format!("- End: {}", format_time(series.end())));
    let missing = series.missing_count();
    lines.push(format!(
        "- Missing values: {} ({:.1}%)",
        missing,
        percent(missing, total)
    ));
    if let Some(stats) = context.read_stats.as_ref().filter(|s| s.unparsable > 0) {
        lines.push(format!("- Unparsable values: {}", stats.unparsable));
    }
    lines.push(format!(
        "- Nominal interval: {}{}",
        format_interval(metadata.nominal_interval),
        if context.read_stats.as_ref().is_some_and(|s| s.inferred_interval) {
            " (inferred)"
        } else {
            ""
        }
    ));
    lines.push(format!("- Gaps: {}", series.gap_count()));
    lines.push(format!(
        "- Valid range: {} to {}",
        metadata.valid_range.min, metadata.valid_range.max
    ));
    lines.push(String::new());

    lines.push("## Rule execution".to_string());
    lines.push(String::new());
    lines.push("| Rule | Status | Flags raised | Notes |".to_string());
    lines.push("|------|--------|--------------|-------|".to_string());
    for execution in result.executions() {
        let mut notes: Vec<String> = execution.status.detail().map(str::to_string).into_iter().collect();
        notes.extend(execution.warnings.iter().cloned());
        lines.push(format!(
            "| {} | {} | {} | {} |",
            execution.rule,
            execution.status.label(),
            execution.flags_raised,
            notes.join("; ").replace('|', "/")
        ));
    }
    if result.executions().is_empty() {
        lines.push("| (none) | - | 0 | no rules enabled |".to_string());
    }
    lines.push(String::new());

    lines.push("## Flag statistics".to_string());
    lines.push(String::new());
    lines.push(format!(
        "{} flags on {} of {} samples.",
        summary.total_flags, summary.flagged_samples, total
    ));
    lines.push(String::new());
    lines.push("### By kind".to_string());
    for kind in FlagKind::ALL {
        let n = summary.finding_count(kind);
        lines.push(format!("- {}: {} ({:.1}%)", kind.label(), n, percent(n, total)));
    }
    for kind in FlagKind::ALL {
        let n = summary.info_count(kind);
        if n > 0 {
            lines.push(format!("- {} notes (info only): {}", kind.label(), n));
        }
    }
    lines.push(String::new());
    lines.push("### By severity".to_string());
    for severity in Severity::ALL {
        lines.push(format!("- {}: {}", severity, summary.severity_count(severity)));
    }
    lines.push(String::new());
    lines.push("### Samples by highest severity".to_string());
    lines.push(format!(
        "- ok: {} ({:.1}%)",
        summary.clean_samples(),
        percent(summary.clean_samples(), total)
    ));
    for severity in Severity::ALL {
        let n = summary
            .samples_by_max_severity
            .get(&severity)
            .copied()
            .unwrap_or(0);
        lines.push(format!("- {}: {} ({:.1}%)", severity, n, percent(n, total)));
    }
    lines.push(String::new());

    if let Some(chart) = &context.chart {
        lines.push("## Quick view".to_string());
        lines.push(format!("![QC chart]({})", chart.display()));
        lines.push(String::new());
    }

    lines.push("## Notes for operator".to_string());
    for execution in result.executions() {
        match &execution.status {
            RuleStatus::Completed => {}
            RuleStatus::InvalidConfig { reason } => lines.push(format!(
                "- **{} did not run** because its configuration is invalid: {}",
                execution.rule, reason
            )),
            RuleStatus::Failed { message } => lines.push(format!(
                "- **{} failed** and contributed no flags: {}",
                execution.rule, message
            )),
        }
    }
    lines.push("- Review flagged points before using data in reports.".to_string());
    lines.push("- Range and spike flags may indicate real events or sensor faults.".to_string());
    lines.push(
        "- Stuck sensor flags usually indicate a frozen sensor or communication issue.".to_string(),
    );
    lines.push("- Step-rate flags indicate abrupt changes that may need confirmation.".to_string());
    lines.push(String::new());

    lines.join("\n")
}
