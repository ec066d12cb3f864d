//! Per-consumer replay positions.

use crate::datasource::Sample;
use crate::drawable::ModelId;

/// A consumer-owned replay position into one [`PointSeries`](super::PointSeries).
///
/// The cursor is non-decreasing between resets. It also remembers the last
/// replayed sample so the next incremental replay can join onto it.
#[derive(Debug, Clone)]
pub struct AppendCursor {
    series: ModelId,
    epoch: u64,
    last: Option<(u64, Sample)>,
}

impl AppendCursor {
    pub(crate) fn new(series: ModelId, epoch: u64) -> Self {
        Self {
            series,
            epoch,
            last: None,
        }
    }

    /// The series this cursor belongs to.
    pub fn series(&self) -> ModelId {
        self.series
    }

    /// Logical index of the last replayed sample, `None` before start.
    pub fn last_index(&self) -> Option<u64> {
        self.last.map(|(index, _)| index)
    }

    /// The last replayed sample.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last.map(|(_, sample)| sample)
    }

    /// Logical index of the next sample to replay.
    pub fn next_index(&self) -> u64 {
        self.last_index().map_or(0, |index| index + 1)
    }

    /// Move back to "before start".
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    pub(crate) fn record(&mut self, index: u64, sample: Sample) {
        debug_assert!(self.last_index().is_none_or(|last| index > last));
        self.last = Some((index, sample));
    }
}

/// Outcome of one [`PointSeries::advance`](super::PointSeries::advance) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Number of samples handed to the consumer.
    pub replayed: usize,
    /// Whether the cursor had fallen behind and replay restarted.
    pub resynced: bool,
}
