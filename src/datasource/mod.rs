//! Data sources and append-only storage.
//!
//! [`PointSeries`] is a capacity-bounded ring buffer of samples with logical
//! indices that keep increasing across eviction. Consumers replay it
//! incrementally through an [`AppendCursor`] they own.

mod cursor;

pub use cursor::{AppendCursor, Replay};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::drawable::ModelId;
use crate::geom::Point;
use crate::subject::{Event, Subject};

/// A point series shared between its producer and its renderers.
pub type SharedSeries = Rc<RefCell<PointSeries>>;

/// One recorded sample.
///
/// `seq_x` and `seq_y` are discontinuity sequence numbers supplied by the
/// producer, one per axis. A change in either one between consecutive
/// samples means the two must not be joined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Sample value.
    pub point: Point,
    /// X-axis discontinuity sequence number.
    pub seq_x: u64,
    /// Y-axis discontinuity sequence number.
    pub seq_y: u64,
}

impl Sample {
    /// Create a sample with both sequence numbers at zero.
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_sequence(Point::new(x, y), 0, 0)
    }

    /// Create a sample with explicit sequence numbers.
    pub fn with_sequence(point: Point, seq_x: u64, seq_y: u64) -> Self {
        Self {
            point,
            seq_x,
            seq_y,
        }
    }

    /// Whether this sample continues the run of `previous`.
    pub fn continues(&self, previous: &Self) -> bool {
        self.seq_x == previous.seq_x && self.seq_y == previous.seq_y
    }
}

/// Capacity-bounded, append-only ring buffer of samples.
#[derive(Debug)]
pub struct PointSeries {
    id: ModelId,
    capacity: usize,
    samples: VecDeque<Sample>,
    start: u64,
    epoch: u64,
    subject: Subject,
}

impl PointSeries {
    /// Create an empty series retaining at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "point series capacity must be positive");
        Self {
            id: ModelId::next(),
            capacity,
            samples: VecDeque::with_capacity(capacity),
            start: 0,
            epoch: 0,
            subject: Subject::new("point-series"),
        }
    }

    /// Create a series wrapped for sharing.
    pub fn shared(capacity: usize) -> SharedSeries {
        Rc::new(RefCell::new(Self::new(capacity)))
    }

    /// Access the series identifier.
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Maximum number of retained samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Logical index of the oldest retained sample.
    pub fn start_index(&self) -> u64 {
        self.start
    }

    /// Logical index one past the newest sample.
    pub fn end_index(&self) -> u64 {
        self.start + self.samples.len() as u64
    }

    /// Number of resets so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Access the subject that broadcasts [`Event::SeriesReset`].
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Append a sample, evicting the oldest at capacity.
    ///
    /// Returns the logical index of the new sample.
    pub fn append(&mut self, sample: Sample) -> u64 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
            self.start += 1;
        }
        self.samples.push_back(sample);
        self.end_index() - 1
    }

    /// Append multiple samples. Returns the number appended.
    pub fn extend<I>(&mut self, samples: I) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut added = 0;
        for sample in samples {
            self.append(sample);
            added += 1;
        }
        added
    }

    /// Access a sample by logical index, if still retained.
    pub fn get(&self, index: u64) -> Option<&Sample> {
        let offset = index.checked_sub(self.start)?;
        self.samples.get(usize::try_from(offset).ok()?)
    }

    /// Access the newest sample.
    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterate over retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Drop every sample and start a new epoch.
    ///
    /// Logical indices keep increasing. Observers receive
    /// [`Event::SeriesReset`] while the series is still mutably borrowed, so
    /// they must not borrow it back.
    pub fn reset(&mut self) {
        self.start = self.end_index();
        self.samples.clear();
        self.epoch += 1;
        tracing::debug!(series = ?self.id, epoch = self.epoch, "point series reset");
        self.subject.notify(&Event::SeriesReset(self.id));
    }

    /// Create a cursor positioned before the first sample.
    pub fn cursor(&self) -> AppendCursor {
        AppendCursor::new(self.id, self.epoch)
    }

    /// Check whether the cursor lost track of the retained window.
    ///
    /// A stale cursor must be treated as a full resync request.
    pub fn is_stale(&self, cursor: &AppendCursor) -> bool {
        let Some(last) = cursor.last_index() else {
            return false;
        };
        cursor.epoch() != self.epoch || last + 1 < self.start || last >= self.end_index()
    }

    /// Check whether replaying the cursor would produce anything new.
    pub fn has_pending(&self, cursor: &AppendCursor) -> bool {
        if self.is_stale(cursor) {
            return true;
        }
        cursor.next_index().max(self.start) < self.end_index()
    }

    /// Replay samples the cursor has not seen yet and move it to the end.
    ///
    /// `consumer` receives each sample together with a discontinuity flag:
    /// `true` when either sequence number differs from the previously
    /// replayed sample. If eviction or a reset left the cursor behind, the
    /// replay restarts at the oldest retained sample and that first sample
    /// is not flagged.
    ///
    /// # Panics
    ///
    /// Panics if the cursor was created by another series.
    pub fn advance<F>(&self, cursor: &mut AppendCursor, mut consumer: F) -> Replay
    where
        F: FnMut(&Sample, bool),
    {
        assert_eq!(
            cursor.series(),
            self.id,
            "append cursor used against a foreign series"
        );
        let resynced = self.is_stale(cursor);
        if resynced {
            tracing::debug!(
                series = ?self.id,
                start = self.start,
                "cursor fell behind the retained window, resyncing"
            );
            cursor.reset();
        }
        cursor.set_epoch(self.epoch);

        let from = cursor.next_index().max(self.start);
        let end = self.end_index();
        let mut previous = cursor.last_sample();
        let mut replayed = 0;
        for sample in self.samples.range((from - self.start) as usize..) {
            let discontinuous = previous.is_some_and(|prev| !sample.continues(&prev));
            consumer(sample, discontinuous);
            previous = Some(*sample);
            replayed += 1;
        }
        if let Some(last) = previous
            && replayed > 0
        {
            cursor.record(end - 1, last);
        }
        Replay { replayed, resynced }
    }
}
