//! Tuning knobs for a merge run.

use std::{
    num::{NonZeroU64, NonZeroUsize},
    time::Duration,
};

use tilemerge_core::DEFAULT_BUSY_TIMEOUT;

/// Queue slots allotted to each writer when no explicit depth is set.
pub const QUEUE_SLOTS_PER_WRITER: usize = 4;

/// Default number of merged tiles between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: NonZeroU64 = match NonZeroU64::new(1000) {
    Some(interval) => interval,
    None => NonZeroU64::MIN,
};

/// Configuration for [`merge_stores`](crate::merge_stores) and
/// [`merge_paths`](crate::merge_paths).
///
/// # Examples
///
/// ```
/// use std::num::{NonZeroU64, NonZeroUsize};
/// use tilemerge_pipeline::MergeOptions;
///
/// let options = MergeOptions::default()
///     .with_read_batch(NonZeroU64::new(500).expect("non-zero"))
///     .with_write_concurrency(NonZeroUsize::new(3).expect("non-zero"));
/// assert_eq!(options.queue_capacity(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Tiles requested per page fetch.
    pub read_batch: NonZeroU64,
    /// Number of concurrent writers, each with its own destination
    /// connection.
    pub write_concurrency: NonZeroUsize,
    /// Merged tiles between progress reports.
    pub progress_interval: NonZeroU64,
    /// Capacity of the queue between reader and writers. Defaults to
    /// [`QUEUE_SLOTS_PER_WRITER`] slots per writer.
    pub queue_depth: Option<NonZeroUsize>,
    /// How long a destination write waits for the database lock.
    pub busy_timeout: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            read_batch: NonZeroU64::MIN,
            write_concurrency: NonZeroUsize::MIN,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            queue_depth: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl MergeOptions {
    /// Set the page size used by the reader.
    #[must_use]
    pub const fn with_read_batch(mut self, read_batch: NonZeroU64) -> Self {
        self.read_batch = read_batch;
        self
    }

    /// Set the number of concurrent writers.
    #[must_use]
    pub const fn with_write_concurrency(mut self, write_concurrency: NonZeroUsize) -> Self {
        self.write_concurrency = write_concurrency;
        self
    }

    /// Set the progress reporting cadence.
    #[must_use]
    pub const fn with_progress_interval(mut self, progress_interval: NonZeroU64) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    /// Override the reader/writer queue capacity.
    #[must_use]
    pub const fn with_queue_depth(mut self, queue_depth: NonZeroUsize) -> Self {
        self.queue_depth = Some(queue_depth);
        self
    }

    /// Set the destination busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Effective capacity of the reader/writer queue.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_depth.map_or_else(
            || {
                self.write_concurrency
                    .get()
                    .saturating_mul(QUEUE_SLOTS_PER_WRITER)
            },
            NonZeroUsize::get,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_match_cli_defaults() {
        let options = MergeOptions::default();
        assert_eq!(options.read_batch.get(), 1);
        assert_eq!(options.write_concurrency.get(), 1);
        assert_eq!(options.progress_interval.get(), 1000);
        assert_eq!(options.queue_capacity(), QUEUE_SLOTS_PER_WRITER);
    }

    #[rstest]
    fn explicit_queue_depth_wins() {
        let options = MergeOptions::default()
            .with_write_concurrency(NonZeroUsize::new(8).expect("non-zero"))
            .with_queue_depth(NonZeroUsize::new(2).expect("non-zero"));
        assert_eq!(options.queue_capacity(), 2);
    }
}
