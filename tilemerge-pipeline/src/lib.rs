//! Concurrent merge pipeline for tile stores.
//!
//! A single reader pages through the source in coordinate order and feeds a
//! bounded queue. A fixed pool of writers drains the queue, each through its
//! own destination connection, and bumps shared atomic counters that drive
//! progress reports. The reader parks when the queue is full, so memory stays
//! bounded however slow the destination is.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tilemerge_pipeline::{CancellationToken, LogProgress, MergeOptions, merge_paths};
//!
//! # async fn run() -> Result<(), tilemerge_pipeline::MergeError> {
//! let report = merge_paths(
//!     "source.mbtiles",
//!     "destination.mbtiles",
//!     &MergeOptions::default(),
//!     Arc::new(LogProgress),
//!     CancellationToken::new(),
//! )
//! .await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod coordinator;
mod error;
mod options;
mod progress;
mod reader;
mod writer;

pub use coordinator::{MergeReport, merge_paths, merge_stores};
pub use error::{ErrorChain, MergeError};
pub use options::{DEFAULT_PROGRESS_INTERVAL, MergeOptions, QUEUE_SLOTS_PER_WRITER};
pub use progress::{LogProgress, ProgressSink, ProgressTracker, RecordingProgress};
pub use tokio_util::sync::CancellationToken;
