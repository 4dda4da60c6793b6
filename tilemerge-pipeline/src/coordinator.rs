//! Wires the reader and writers together and reports the outcome.

use std::{
    fmt,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use indicatif::FormattedDuration;
use log::{debug, info, warn};
use tilemerge_core::{PagePlan, SqliteTileStore, StoreError, TileRecord, TileStore};
use tokio::{
    sync::mpsc,
    task::{self, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::{
    ErrorChain, MergeError, MergeOptions, ProgressSink, ProgressTracker,
    reader::{ReadSummary, read_pages},
    writer::{WorkerSummary, run_worker},
};

/// Summary of a completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Source rows counted before the merge started.
    pub total: u64,
    /// Tiles written to the destination.
    pub merged: u64,
    /// Tiles whose write failed and were dropped.
    pub skipped: u64,
    /// Counted rows the page scan never returned, such as coordinates whose
    /// hash has no image row.
    pub unread: u64,
    /// Pages fetched from the source.
    pub pages: u64,
    /// Wall-clock time from the first page to the final drain.
    pub elapsed: Duration,
}

impl MergeReport {
    /// Whether any tile was skipped.
    #[must_use]
    pub const fn has_skipped(&self) -> bool {
        self.skipped > 0
    }

    /// Whether every counted tile reached the destination.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.skipped == 0 && self.unread == 0
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merged {}/{} tiles from {} pages in {}",
            self.merged,
            self.total,
            self.pages,
            FormattedDuration(self.elapsed)
        )?;
        if self.has_skipped() {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        if self.unread > 0 {
            write!(f, " ({} unread)", self.unread)?;
        }
        Ok(())
    }
}

/// Merge every tile of `source` into the destination store.
///
/// `open_destination` is called once per writer with the writer index; each
/// writer owns the connection it returns. All store I/O runs on Tokio's
/// blocking pool.
///
/// The source and every destination are closed before this returns
/// successfully; on failure, adapters still open are dropped.
///
/// # Errors
///
/// Fails when the source cannot be counted, a destination cannot be opened,
/// a page cannot be fetched, an adapter fails to close or a pipeline task
/// panics. Returns [`MergeError::Cancelled`] when `cancel` fires before the
/// last page was read. Individual tiles that fail to write are skipped and
/// reported in [`MergeReport::skipped`]; counted rows the scan never returned
/// are reported in [`MergeReport::unread`].
pub async fn merge_stores<S, D, F>(
    source: S,
    open_destination: F,
    options: &MergeOptions,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<MergeReport, MergeError>
where
    S: TileStore + 'static,
    D: TileStore + 'static,
    F: FnMut(usize) -> Result<D, StoreError> + Send + 'static,
{
    let (source, counted) = task::spawn_blocking(move || {
        let counted = source.count();
        (source, counted)
    })
    .await
    .map_err(|source| MergeError::Task {
        stage: "count",
        source,
    })?;
    let total = counted.map_err(|source| MergeError::Count { source })?;

    let plan = PagePlan::new(total, options.read_batch);
    let writers = options.write_concurrency.get();
    info!(
        "merging {total} tiles in {} pages of up to {} using {writers} writers",
        plan.page_count(),
        plan.batch()
    );

    let destinations = open_destinations(open_destination, writers).await?;

    let progress = Arc::new(ProgressTracker::new(
        total,
        options.progress_interval,
        sink,
    ));
    let (sender, receiver) = mpsc::channel::<TileRecord>(options.queue_capacity());
    let receiver = Arc::new(Mutex::new(receiver));

    let mut workers = JoinSet::new();
    for (worker, destination) in destinations.into_iter().enumerate() {
        let queue = Arc::clone(&receiver);
        let progress = Arc::clone(&progress);
        workers.spawn_blocking(move || run_worker(worker, destination, &queue, &progress));
    }
    drop(receiver);

    let reader = task::spawn_blocking(move || {
        let outcome = read_pages(&source, plan, &sender, &cancel);
        drop(sender);
        let closed = source
            .close()
            .map_err(|source| MergeError::CloseSource { source });
        (outcome, closed)
    });

    let read = match reader.await {
        Ok((outcome, closed)) => outcome.and_then(|summary| closed.map(|()| summary)),
        Err(source) => Err(MergeError::Task {
            stage: "reader",
            source,
        }),
    };
    let written = join_writers(&mut workers).await;

    let snapshot = progress.report();
    let summary = read?;
    let tally = written?;
    debug!(
        "{} writers finished: {} merged, {} skipped",
        writers, tally.merged, tally.skipped
    );
    finish(
        summary,
        MergeReport {
            total,
            merged: snapshot.merged,
            skipped: snapshot.skipped,
            unread: total.saturating_sub(summary.forwarded),
            pages: summary.pages,
            elapsed: snapshot.elapsed,
        },
    )
}

/// Merge the SQLite store at `source_path` into the one at
/// `destination_path`.
///
/// The source is opened read-only. Each writer opens its own read-write
/// connection to the destination with `options.busy_timeout`. Neither file is
/// created when missing.
///
/// # Errors
///
/// See [`merge_stores`]; additionally fails when either store cannot be
/// opened.
pub async fn merge_paths(
    source_path: impl AsRef<Path>,
    destination_path: impl AsRef<Path>,
    options: &MergeOptions,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<MergeReport, MergeError> {
    let source_path = source_path.as_ref().to_path_buf();
    let source = task::spawn_blocking(move || SqliteTileStore::open_read_only(&source_path))
        .await
        .map_err(|source| MergeError::Task {
            stage: "open source",
            source,
        })?
        .map_err(|source| MergeError::OpenSource { source })?;

    let destination_path = destination_path.as_ref().to_path_buf();
    let busy_timeout = options.busy_timeout;
    merge_stores(
        source,
        move |_worker| SqliteTileStore::open(&destination_path, busy_timeout),
        options,
        sink,
        cancel,
    )
    .await
}

async fn open_destinations<D, F>(mut open: F, writers: usize) -> Result<Vec<D>, MergeError>
where
    D: TileStore + 'static,
    F: FnMut(usize) -> Result<D, StoreError> + Send + 'static,
{
    task::spawn_blocking(move || {
        (0..writers)
            .map(|worker| {
                open(worker).map_err(|source| MergeError::OpenDestination { worker, source })
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|source| MergeError::Task {
        stage: "open destination",
        source,
    })?
}

/// Wait for every writer, keeping the first failure.
async fn join_writers(
    workers: &mut JoinSet<Result<WorkerSummary, MergeError>>,
) -> Result<WorkerSummary, MergeError> {
    let mut tally = WorkerSummary::default();
    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        let outcome = joined.map_err(|source| MergeError::Task {
            stage: "writer",
            source,
        });
        match outcome.and_then(|result| result) {
            Ok(summary) => {
                tally.merged += summary.merged;
                tally.skipped += summary.skipped;
            }
            Err(err) => {
                warn!("{}", ErrorChain(&err));
                failure.get_or_insert(err);
            }
        }
    }
    failure.map_or(Ok(tally), Err)
}

fn finish(summary: ReadSummary, report: MergeReport) -> Result<MergeReport, MergeError> {
    if summary.cancelled {
        warn!(
            "merge cancelled after {} of {} tiles",
            report.merged, report.total
        );
        return Err(MergeError::Cancelled {
            merged: report.merged,
            skipped: report.skipped,
        });
    }
    if report.has_skipped() {
        warn!("{} tiles could not be written and were skipped", report.skipped);
    }
    if report.unread > 0 {
        warn!(
            "{} of {} counted tiles were never read; their coordinates have no image data",
            report.unread, report.total
        );
    }
    info!("{report}");
    Ok(report)
}
