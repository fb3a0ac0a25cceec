//! Quick-look PNG chart of a QC run
//!
//! Draws the value series as a line, broken at missing values, with every
//! flagged sample marked by a cross coloured by its highest severity. The
//! valid range bounds are drawn as light horizontal lines when they fall
//! inside the plotted value range.
//!
//! The chart carries no text so it renders without system fonts; titles
//! and labels live in the Markdown report that links to it.

use crate::error::{QcError, Result};
use crate::pipeline::result::max_severity;
use crate::pipeline::PipelineResult;
use crate::models::Severity;

use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

pub const CHART_SIZE: (u32, u32) = (1200, 480);
const MARGIN: u32 = 20;
const MARKER_SIZE: i32 = 5;

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const BOUND_COLOR: RGBColor = RGBColor(200, 200, 200);
const INFO_COLOR: RGBColor = RGBColor(127, 127, 127);
const WARNING_COLOR: RGBColor = RGBColor(255, 127, 14);
const FAIL_COLOR: RGBColor = RGBColor(214, 39, 40);

fn severity_color(severity: Severity) -> RGBColor {
    match severity {
        Severity::Info => INFO_COLOR,
        Severity::Warning => WARNING_COLOR,
        Severity::Fail => FAIL_COLOR,
    }
}

/// File name for the chart of `variable`, e.g. `water_level_m_qc.png`
pub fn chart_file_name(variable: &str) -> String {
    let stem: String = variable
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "value".to_string() } else { stem };
    format!("{}_qc.png", stem)
}

/// Points of the chart: hours since the first sample against value
struct ChartData {
    segments: Vec<Vec<(f64, f64)>>,
    flagged: Vec<((f64, f64), Severity)>,
    x_range: Range<f64>,
    y_range: Range<f64>,
}

fn padded(min: f64, max: f64) -> Range<f64> {
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if max - min < f64::EPSILON {
        return (min - 0.5)..(max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

fn chart_data(result: &PipelineResult) -> Result<ChartData> {
    let series = result.series();
    let store = result.store();
    let Some(start) = series.start() else {
        return Ok(ChartData {
            segments: Vec::new(),
            flagged: Vec::new(),
            x_range: 0.0..1.0,
            y_range: 0.0..1.0,
        });
    };

    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut flagged = Vec::new();
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let mut x_max = 0.0f64;

    for (index, sample) in series.samples().iter().enumerate() {
        let x = (sample.timestamp - start).num_milliseconds() as f64 / 3_600_000.0;
        x_max = x_max.max(x);
        let Some(y) = sample.value else {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        };
        y_min = y_min.min(y);
        y_max = y_max.max(y);
        current.push((x, y));

        if let Some(severity) = max_severity(store.flags_at(index)?) {
            flagged.push(((x, y), severity));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    Ok(ChartData {
        segments,
        flagged,
        x_range: if x_max > 0.0 { 0.0..x_max } else { 0.0..1.0 },
        y_range: padded(y_min, y_max),
    })
}

fn draw(result: &PipelineResult, path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let data = chart_data(result)?;
    let valid = result.series().metadata().valid_range;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(MARGIN)
        .build_cartesian_2d(data.x_range.clone(), data.y_range.clone())?;

    let (x0, x1) = (data.x_range.start, data.x_range.end);
    chart.draw_series(
        [valid.min, valid.max]
            .into_iter()
            .filter(|bound| data.y_range.contains(bound))
            .map(|bound| PathElement::new(vec![(x0, bound), (x1, bound)], BOUND_COLOR.stroke_width(1))),
    )?;

    for segment in data.segments {
        chart.draw_series(LineSeries::new(segment, LINE_COLOR.stroke_width(1)))?;
    }

    chart.draw_series(data.flagged.iter().map(|&(point, severity)| {
        Cross::new(point, MARKER_SIZE, severity_color(severity).stroke_width(2))
    }))?;

    let (y0, y1) = (data.y_range.start, data.y_range.end);
    chart.draw_series(std::iter::once(Rectangle::new(
        [(x0, y0), (x1, y1)],
        BLACK.stroke_width(1),
    )))?;

    root.present()?;
    Ok(())
}

/// Render the quick-look chart of `result` to a PNG at `path`
pub fn write_chart(result: &PipelineResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    draw(result, path)
        .map_err(|e| QcError::invalid_input(path, format!("Failed to render chart: {}", e)))?;
    debug!("Wrote chart {}", path.display());
    Ok(())
}
