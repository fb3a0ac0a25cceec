//! Robust statistics used by the spike rule.

/// Median of `values`, reordering the slice in place
///
/// Even-length inputs average the two middle values. Returns `None` for an
/// empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Median absolute deviation around `center`
///
/// `scratch` is cleared and reused to hold the deviations.
pub fn median_absolute_deviation(values: &[f64], center: f64, scratch: &mut Vec<f64>) -> Option<f64> {
    scratch.clear();
    scratch.extend(values.iter().map(|v| (v - center).abs()));
    median(scratch)
}
