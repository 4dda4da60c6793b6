//! Errors raised while driving a merge.

use std::{error::Error as StdError, fmt};

use thiserror::Error;
use tilemerge_core::StoreError;

/// Fatal merge failures.
///
/// Per-tile write failures are not represented here: they are logged,
/// counted as skipped, and the merge carries on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MergeError {
    /// Opening the source store failed.
    #[error("failed to open source store")]
    OpenSource {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Opening a destination connection for a writer failed.
    #[error("failed to open destination store for writer {worker}")]
    OpenDestination {
        /// Index of the writer the connection was meant for.
        worker: usize,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Counting the source tiles failed.
    #[error("failed to count source tiles")]
    Count {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Fetching a page from the source failed; later pages were not read.
    #[error("failed to fetch page {page} (offset {offset})")]
    FetchPage {
        /// Index of the failed page.
        page: u64,
        /// Row offset of the failed page.
        offset: u64,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Closing the source store failed.
    #[error("failed to close source store")]
    CloseSource {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Closing a writer's destination connection failed.
    #[error("failed to close destination store for writer {worker}")]
    CloseDestination {
        /// Index of the writer owning the connection.
        worker: usize,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
    /// Every writer stopped before the reader finished.
    #[error("writer queue closed while {pending} tiles were still being read")]
    QueueClosed {
        /// Tiles the reader could not hand over.
        pending: u64,
    },
    /// A blocking pipeline task panicked or was aborted.
    #[error("{stage} task failed")]
    Task {
        /// Pipeline stage the task belonged to.
        stage: &'static str,
        /// Join failure reported by Tokio.
        #[source]
        source: tokio::task::JoinError,
    },
    /// The merge was cancelled before every page was read.
    #[error("merge cancelled after {merged} tiles ({skipped} skipped)")]
    Cancelled {
        /// Tiles written before cancellation.
        merged: u64,
        /// Tiles skipped before cancellation.
        skipped: u64,
    },
}

/// Renders an error followed by each of its sources, separated by `: `.
///
/// # Examples
///
/// ```
/// use tilemerge_core::StoreError;
/// use tilemerge_pipeline::{ErrorChain, MergeError};
///
/// let err = MergeError::Count {
///     source: StoreError::Backend {
///         operation: "count tiles",
///         message: "offline".to_owned(),
///     },
/// };
/// assert_eq!(
///     ErrorChain(&err).to_string(),
///     "failed to count source tiles: failed to count tiles: offline"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ErrorChain<'a>(pub &'a (dyn StdError + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut cause = self.0.source();
        while let Some(err) = cause {
            write!(f, ": {err}")?;
            cause = err.source();
        }
        Ok(())
    }
}
