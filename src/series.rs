//! Time series storage with per-sample flag attachment.
//!
//! [`Series`] holds one variable's samples and metadata and never changes
//! after loading, so it can be shared with rule workers behind an `Arc`.
//! [`TimeSeriesStore`] pairs a series with append-only flag lists, one per
//! sample index. Only the pipeline writes to the store.

use crate::error::{QcError, Result};
use crate::models::{Flag, Sample, SeriesMetadata};
use chrono::{NaiveDateTime, TimeDelta};
use std::sync::Arc;

/// Immutable single-variable series for one station
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    metadata: SeriesMetadata,
    samples: Vec<Sample>,
}

impl Series {
    /// Create a series from samples already ordered by timestamp
    pub fn new(metadata: SeriesMetadata, samples: Vec<Sample>) -> Self {
        Self { metadata, samples }
    }

    pub fn metadata(&self) -> &SeriesMetadata {
        &self.metadata
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.samples.len() {
            return Err(QcError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            });
        }
        Ok(())
    }

    pub fn sample(&self, index: usize) -> Result<&Sample> {
        self.check_index(index)?;
        Ok(&self.samples[index])
    }

    /// Value at `index`, `None` when the sample is missing
    pub fn value(&self, index: usize) -> Result<Option<f64>> {
        Ok(self.sample(index)?.value)
    }

    /// Time elapsed from sample `from` to sample `to`
    pub fn elapsed(&self, from: usize, to: usize) -> Result<TimeDelta> {
        let start = self.sample(from)?.timestamp;
        let end = self.sample(to)?.timestamp;
        Ok(end - start)
    }

    /// Samples within `radius` positions of `center`, clamped to the series
    pub fn window(&self, center: usize, radius: usize) -> Result<SampleWindow<'_>> {
        self.check_index(center)?;
        let start = center.saturating_sub(radius);
        let end = center.saturating_add(radius).saturating_add(1).min(self.samples.len());
        Ok(SampleWindow {
            start,
            center,
            samples: &self.samples[start..end],
        })
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.samples.last().map(|s| s.timestamp)
    }

    pub fn missing_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_missing()).count()
    }

    /// Number of consecutive spacings longer than the nominal interval
    pub fn gap_count(&self) -> usize {
        let nominal = self.metadata.nominal_interval;
        self.samples
            .windows(2)
            .filter(|pair| pair[1].timestamp - pair[0].timestamp > nominal)
            .count()
    }
}

/// A contiguous slice of samples around a centre index
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    start: usize,
    center: usize,
    samples: &'a [Sample],
}

impl<'a> SampleWindow<'a> {
    /// Series index of the first sample in the window
    pub fn start(&self) -> usize {
        self.start
    }

    /// Series index one past the last sample in the window
    pub fn end(&self) -> usize {
        self.start + self.samples.len()
    }

    pub fn center(&self) -> usize {
        self.center
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &'a [Sample] {
        self.samples
    }

    /// Non-missing values in the window, in series order
    pub fn values(&self) -> impl Iterator<Item = f64> + 'a {
        self.samples.iter().filter_map(|s| s.value)
    }
}

/// Series plus the flags attached to each of its samples
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesStore {
    series: Arc<Series>,
    flags: Vec<Vec<Flag>>,
}

impl TimeSeriesStore {
    pub fn new(series: Series) -> Self {
        Self::from_shared(Arc::new(series))
    }

    pub fn from_shared(series: Arc<Series>) -> Self {
        let flags = vec![Vec::new(); series.len()];
        Self { series, flags }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Shared handle for read-only rule workers
    pub fn shared(&self) -> Arc<Series> {
        Arc::clone(&self.series)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Append a flag to a sample; existing flags are never touched
    pub fn add_flag(&mut self, index: usize, flag: Flag) -> Result<()> {
        let len = self.flags.len();
        let slot = self
            .flags
            .get_mut(index)
            .ok_or(QcError::IndexOutOfRange { index, len })?;
        slot.push(flag);
        Ok(())
    }

    pub fn flags_at(&self, index: usize) -> Result<&[Flag]> {
        self.flags
            .get(index)
            .map(Vec::as_slice)
            .ok_or(QcError::IndexOutOfRange {
                index,
                len: self.flags.len(),
            })
    }

    /// Every attached flag with its sample index, ordered by index
    pub fn flags(&self) -> impl Iterator<Item = (usize, &Flag)> + '_ {
        self.flags
            .iter()
            .enumerate()
            .flat_map(|(index, flags)| flags.iter().map(move |flag| (index, flag)))
    }

    pub fn flag_count(&self) -> usize {
        self.flags.iter().map(Vec::len).sum()
    }

    /// Indices carrying at least one flag
    pub fn flagged_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flags)| !flags.is_empty())
            .map(|(index, _)| index)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::{FlagKind, Severity};

    #[test]
    fn test_index_out_of_range() {
        let series = hourly_values(&[1.0, 2.0, 3.0]);
        assert!(series.sample(2).is_ok());
        match series.sample(3) {
            Err(QcError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 3);
                assert_eq!(len, 3);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_window_is_clamped_at_boundaries() {
        let series = hourly_values(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let head = series.window(0, 2).unwrap();
        assert_eq!((head.start(), head.end()), (0, 3));

        let middle = series.window(2, 2).unwrap();
        assert_eq!(middle.len(), 5);

        let tail = series.window(4, 2).unwrap();
        assert_eq!((tail.start(), tail.end()), (2, 5));

        let huge = series.window(1, usize::MAX).unwrap();
        assert_eq!(huge.len(), 5);

        assert!(series.window(5, 1).is_err());
    }

    #[test]
    fn test_window_values_skip_missing() {
        let series = hourly_series(&[Some(1.0), None, Some(3.0)]);
        let values: Vec<f64> = series.window(1, 1).unwrap().values().collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_missing_and_gap_counts() {
        let start = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let samples = vec![
            Sample::new(start, Some(1.0)),
            Sample::missing(start + TimeDelta::hours(1)),
            Sample::new(start + TimeDelta::hours(4), Some(2.0)),
        ];
        let metadata = SeriesMetadata::new("s", "v", crate::models::VariableKind::Level)
            .with_nominal_interval(TimeDelta::hours(1));
        let series = Series::new(metadata, samples);

        assert_eq!(series.missing_count(), 1);
        assert_eq!(series.gap_count(), 1);
        assert_eq!(series.elapsed(0, 2).unwrap(), TimeDelta::hours(4));
    }

    #[test]
    fn test_add_flag_appends() {
        let mut store = TimeSeriesStore::new(hourly_values(&[1.0, 2.0]));
        store
            .add_flag(1, Flag::fail(FlagKind::RangeViolation, "too high"))
            .unwrap();
        store
            .add_flag(1, Flag::warning(FlagKind::StuckValue, "flat"))
            .unwrap();

        let flags = store.flags_at(1).unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].kind, FlagKind::RangeViolation);
        assert_eq!(flags[1].severity, Severity::Warning);
        assert!(store.flags_at(0).unwrap().is_empty());
        assert_eq!(store.flag_count(), 2);
        assert_eq!(store.flagged_indices().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_add_flag_out_of_range() {
        let mut store = TimeSeriesStore::new(hourly_values(&[1.0]));
        let result = store.add_flag(5, Flag::info(FlagKind::Spike, "x"));
        assert!(matches!(
            result,
            Err(QcError::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert_eq!(store.flag_count(), 0);
    }
}
