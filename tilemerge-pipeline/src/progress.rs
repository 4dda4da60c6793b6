//! Shared completion counters and progress sinks.

use std::{
    num::NonZeroU64,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use log::info;
use tilemerge_core::ProgressSnapshot;

/// Receives progress snapshots as a merge advances.
///
/// Sinks are called from writer threads, so implementations must be cheap
/// and thread-safe.
pub trait ProgressSink: Send + Sync {
    /// Handle one snapshot.
    fn report(&self, snapshot: &ProgressSnapshot);
}

/// Logs each snapshot at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, snapshot: &ProgressSnapshot) {
        info!("{snapshot}");
    }
}

/// Keeps every snapshot in memory, for callers that inspect progress after
/// the fact.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
}

impl RecordingProgress {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots received so far, in arrival order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, snapshot: &ProgressSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*snapshot);
    }
}

/// Race-free completion counters shared by every writer.
///
/// Counters only ever increase. A report is emitted each time the merged
/// counter reaches a multiple of the interval.
pub struct ProgressTracker {
    total: u64,
    interval: NonZeroU64,
    started: Instant,
    merged: AtomicU64,
    skipped: AtomicU64,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("interval", &self.interval)
            .field("merged", &self.merged)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    /// Start tracking a merge of `total` tiles; the clock starts now.
    pub fn new(total: u64, interval: NonZeroU64, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            total,
            interval,
            started: Instant::now(),
            merged: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            sink,
        }
    }

    /// Count one merged tile, reporting when the cadence is reached.
    ///
    /// Returns the merged count including this tile.
    pub fn record_merged(&self) -> u64 {
        let merged = self.merged.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if merged.is_multiple_of(self.interval.get()) {
            self.sink.report(&self.snapshot_at(merged));
        }
        merged
    }

    /// Count one skipped tile. Returns the skipped count including it.
    pub fn record_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Tiles merged so far.
    #[must_use]
    pub fn merged(&self) -> u64 {
        self.merged.load(Ordering::Acquire)
    }

    /// Tiles skipped so far.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Acquire)
    }

    /// Current counters and elapsed time.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.merged())
    }

    /// Send the current snapshot to the sink regardless of cadence.
    pub fn report(&self) -> ProgressSnapshot {
        let snapshot = self.snapshot();
        self.sink.report(&snapshot);
        snapshot
    }

    fn snapshot_at(&self, merged: u64) -> ProgressSnapshot {
        ProgressSnapshot::new(merged, self.skipped(), self.total, self.started.elapsed())
    }
}
