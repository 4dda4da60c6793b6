//! Sequential page reader feeding the writer queue.

use log::{debug, warn};
use tilemerge_core::{PagePlan, TileRecord, TileStore};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::MergeError;

/// Outcome of a reader run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReadSummary {
    /// Pages fetched successfully.
    pub(crate) pages: u64,
    /// Records handed to the writer queue.
    pub(crate) forwarded: u64,
    /// Whether the run stopped early because of cancellation.
    pub(crate) cancelled: bool,
}

/// Fetch every page in `plan`, one at a time, and push each record into
/// `queue`.
///
/// Blocks the calling thread: fetches are synchronous and
/// `blocking_send` parks while the queue is full. Forwarding stops after
/// `plan.total()` records so the completion counter can never overshoot the
/// count taken at start-up.
///
/// # Errors
///
/// Returns [`MergeError::FetchPage`] when a page cannot be read; no later
/// page is requested. Returns [`MergeError::QueueClosed`] when every writer
/// has gone away.
pub(crate) fn read_pages<S>(
    source: &S,
    plan: PagePlan,
    queue: &Sender<TileRecord>,
    cancel: &CancellationToken,
) -> Result<ReadSummary, MergeError>
where
    S: TileStore + ?Sized,
{
    let mut summary = ReadSummary::default();
    for page in plan.pages() {
        if cancel.is_cancelled() {
            warn!(
                "cancellation requested; stopping before page {} of {}",
                page.index,
                plan.page_count()
            );
            summary.cancelled = true;
            break;
        }

        let records = source
            .fetch_page(page)
            .map_err(|source| MergeError::FetchPage {
                page: page.index,
                offset: page.offset,
                source,
            })?;
        debug!(
            "fetched page {} (offset {}, {} records)",
            page.index,
            page.offset,
            records.len()
        );
        summary.pages += 1;

        for record in records {
            if summary.forwarded >= plan.total() {
                debug!("source grew during the merge; ignoring extra rows");
                return Ok(summary);
            }
            queue
                .blocking_send(record)
                .map_err(|_| MergeError::QueueClosed {
                    pending: plan.total() - summary.forwarded,
                })?;
            summary.forwarded += 1;
        }
    }
    Ok(summary)
}
