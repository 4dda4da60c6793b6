//! Facade crate for the tilemerge toolkit.
//!
//! This crate re-exports the tile domain types and exposes the SQLite store
//! and the concurrent merge pipeline behind feature flags.

#![forbid(unsafe_code)]

pub use tilemerge_core::{
    Page, PagePlan, ProgressSnapshot, StoreError, TileCoordinate, TileId, TileRecord, TileStore,
};

#[cfg(feature = "store-sqlite")]
pub use tilemerge_core::{DEFAULT_BUSY_TIMEOUT, SqliteTileStore};

#[cfg(feature = "test-support")]
pub use tilemerge_core::test_support;

#[cfg(feature = "pipeline")]
pub use tilemerge_pipeline::{
    CancellationToken, ErrorChain, LogProgress, MergeError, MergeOptions, MergeReport,
    ProgressSink, ProgressTracker, RecordingProgress, merge_paths, merge_stores,
};
