//! Progress reporting and cooperative cancellation
//!
//! Long running engines ([`crate::enrichment::EnrichmentEngine`],
//! [`crate::gsea::GseaEngine`]) accept a [`ProgressSink`]. They report the
//! fraction of finished work and check for cancellation between batches.
//! A cancelled engine returns [`crate::GeneSigError::Cancelled`] and no
//! partial results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{GeneSigError, GeneSigResult};

/// Receives progress updates from an engine
///
/// Implementations must be cheap, `report` can be called many times
/// per second.
pub trait ProgressSink: Sync {
    /// Called with the fraction of finished work, in `0.0..=1.0`
    fn report(&self, fraction: f64);

    /// Returns `true` if the engine should stop as soon as possible
    fn cancelled(&self) -> bool;
}

/// A [`ProgressSink`] that ignores all updates and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64) {}

    fn cancelled(&self) -> bool {
        false
    }
}

/// A [`ProgressSink`] that can be cancelled from another thread
///
/// It stores the last reported fraction.
///
/// # Examples
///
/// ```
/// use genesig::progress::{CancelFlag, ProgressSink};
///
/// let flag = CancelFlag::default();
/// flag.report(0.5);
/// assert!((flag.last() - 0.5).abs() < f64::EPSILON);
/// assert!(!flag.cancelled());
///
/// flag.cancel();
/// assert!(flag.cancelled());
/// ```
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    last: AtomicU64,
}

impl CancelFlag {
    /// Requests cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// The last fraction reported to this sink
    pub fn last(&self) -> f64 {
        f64::from_bits(self.last.load(Ordering::Relaxed))
    }
}

impl ProgressSink for CancelFlag {
    fn report(&self, fraction: f64) {
        self.last.store(fraction.to_bits(), Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Throttles progress reports to a coarse grid
///
/// Only forwards a report if it advanced at least one grid step
/// (1 % by default) since the last forwarded one.
pub(crate) struct ProgressGrid<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    steps: usize,
    last: Option<usize>,
}

impl<'a> ProgressGrid<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            total,
            steps: 100,
            last: None,
        }
    }

    /// Reports that `done` of `total` items are finished
    ///
    /// # Errors
    ///
    /// [`GeneSigError::Cancelled`] if the sink requests cancellation
    pub fn tick(&mut self, done: usize) -> GeneSigResult<()> {
        let bucket = if self.total == 0 {
            self.steps
        } else {
            done.min(self.total) * self.steps / self.total
        };
        if self.last.map_or(true, |last| bucket > last) {
            self.last = Some(bucket);
            self.sink
                .report(crate::f64_from_usize(bucket) / crate::f64_from_usize(self.steps));
        }
        check_cancelled(self.sink)
    }
}

/// Returns `Err(Cancelled)` if the sink requests it
pub(crate) fn check_cancelled(sink: &dyn ProgressSink) -> GeneSigResult<()> {
    if sink.cancelled() {
        tracing::debug!("Cancellation requested");
        Err(GeneSigError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<f64>>,
    }

    impl ProgressSink for Recorder {
        fn report(&self, fraction: f64) {
            self.seen.lock().unwrap().push(fraction);
        }
        fn cancelled(&self) -> bool {
            false
        }
    }

    #[test]
    fn grid_throttles() {
        let rec = Recorder::default();
        let mut grid = ProgressGrid::new(&rec, 1000);
        for i in 0..=1000 {
            grid.tick(i).unwrap();
        }
        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.len(), 101);
        assert!((seen.last().unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn grid_small_total() {
        let rec = Recorder::default();
        let mut grid = ProgressGrid::new(&rec, 3);
        for i in 0..=3 {
            grid.tick(i).unwrap();
        }
        assert_eq!(rec.seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn cancel() {
        let flag = CancelFlag::default();
        let mut grid = ProgressGrid::new(&flag, 10);
        assert!(grid.tick(1).is_ok());
        flag.cancel();
        assert_eq!(grid.tick(2), Err(GeneSigError::Cancelled));
    }
}
