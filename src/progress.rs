//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a thumbnail run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for per-item progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use thumbnailer::{ProgressCallback, ProgressInfo, ThumbnailerConfig};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "{} processed ({} generated, {} failed)",
//!             info.processed, info.generated, info.failed
//!         );
//!     }
//! }
//!
//! let config = ThumbnailerConfig::new("thumbnails", "archives")
//!     .with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// What happened to the most recently processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemOutcome {
    /// A thumbnail was written and recorded.
    Generated,
    /// The record was marked with an error sentinel.
    Failed,
    /// Another worker recorded an outcome for the record first.
    Conflict,
}

/// A snapshot of run progress, delivered after every processed record.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Records claimed so far in this run.
    pub processed: u64,
    /// Thumbnails generated so far.
    pub generated: u64,
    /// Records marked as failed so far.
    pub failed: u64,
    /// Outcome writes lost to another writer so far.
    pub conflicts: u64,
    /// Generation limit for this run, if any.
    pub limit: Option<u64>,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Catalog id of the record just processed.
    pub media_id: i64,
    /// What happened to that record.
    pub outcome: ItemOutcome,
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`] so a configured
/// [`Thumbnailer`](crate::Thumbnailer) can be moved onto a worker thread.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// run. Use [`CancellationToken`] to stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called after each record has been persisted.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request that the
/// associated work stops at its next checkpoint. The run loop checks it
/// before claiming a record, and the FFmpeg decode loop checks its own token
/// between packets so a timed-out decode winds down when it can.
///
/// # Example
///
/// ```
/// use thumbnailer::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones of this token observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks run counters and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    limit: Option<u64>,
    start_time: Instant,
    pub(crate) processed: u64,
    pub(crate) generated: u64,
    pub(crate) failed: u64,
    pub(crate) conflicts: u64,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, limit: Option<u64>) -> Self {
        Self {
            callback,
            limit,
            start_time: Instant::now(),
            processed: 0,
            generated: 0,
            failed: 0,
            conflicts: 0,
        }
    }

    /// Record one processed item and fire the callback.
    pub(crate) fn advance(&mut self, media_id: i64, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Generated => self.generated += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Conflict => self.conflicts += 1,
        }

        let info = ProgressInfo {
            processed: self.processed,
            generated: self.generated,
            failed: self.failed,
            conflicts: self.conflicts,
            limit: self.limit,
            elapsed: self.elapsed(),
            media_id,
            outcome,
        };
        self.callback.on_progress(&info);
    }

    /// Returns `true` once the generation limit has been reached.
    pub(crate) fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.generated >= limit)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder(Mutex<Vec<ProgressInfo>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push(info.clone());
        }
    }

    #[test]
    fn tracker_counts_and_reports() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut tracker = ProgressTracker::new(recorder.clone(), Some(2));

        tracker.advance(1, ItemOutcome::Generated);
        tracker.advance(2, ItemOutcome::Failed);
        assert!(!tracker.limit_reached());
        tracker.advance(3, ItemOutcome::Conflict);
        assert!(!tracker.limit_reached());
        tracker.advance(4, ItemOutcome::Generated);
        assert!(tracker.limit_reached());

        assert_eq!(tracker.processed, 4);
        assert_eq!(tracker.failed, 1);
        assert_eq!(tracker.conflicts, 1);

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 4);
        let last = &seen[3];
        assert_eq!((last.media_id, last.outcome), (4, ItemOutcome::Generated));
        assert_eq!((last.generated, last.failed, last.conflicts), (2, 1, 1));
        assert_eq!(seen[2].conflicts, 1);
        assert_eq!(seen[1].conflicts, 0);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
