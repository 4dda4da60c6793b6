//! Writer workers draining the shared record queue.

use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use tilemerge_core::{TileRecord, TileStore};
use tokio::sync::mpsc::Receiver;

use crate::{ErrorChain, MergeError, ProgressTracker};

/// Counts contributed by one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkerSummary {
    pub(crate) merged: u64,
    pub(crate) skipped: u64,
}

/// Shared receiving end of the record queue.
pub(crate) type SharedReceiver = Mutex<Receiver<TileRecord>>;

/// Drain `queue` into `destination` until the reader hangs up.
///
/// A record whose write fails is logged, counted as skipped and dropped.
/// The destination is closed once the queue is exhausted.
///
/// # Errors
///
/// Only closing the destination can fail the worker.
pub(crate) fn run_worker<D>(
    worker: usize,
    mut destination: D,
    queue: &SharedReceiver,
    progress: &ProgressTracker,
) -> Result<WorkerSummary, MergeError>
where
    D: TileStore,
{
    let mut summary = WorkerSummary::default();
    while let Some(record) = next_record(queue) {
        match destination.merge_tile(&record) {
            Ok(()) => {
                progress.record_merged();
                summary.merged += 1;
            }
            Err(err) => {
                warn!(
                    "writer {worker} skipped tile {} ({}): {}",
                    record.coordinate,
                    record.tile_id,
                    ErrorChain(&err)
                );
                progress.record_skipped();
                summary.skipped += 1;
            }
        }
    }
    debug!(
        "writer {worker} drained queue: {} merged, {} skipped",
        summary.merged, summary.skipped
    );
    destination
        .close()
        .map_err(|source| MergeError::CloseDestination { worker, source })?;
    Ok(summary)
}

// The lock is held only while waiting for the next record, so one idle
// worker parks on the channel while the rest wait on the mutex.
fn next_record(queue: &SharedReceiver) -> Option<TileRecord> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .blocking_recv()
}
