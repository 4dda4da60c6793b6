//! Core domain types for merging tiled-map stores.
//!
//! A tile store keeps two tables: coordinates mapped to content hashes, and
//! blobs keyed by hash. This crate models those rows, defines the
//! [`TileStore`] seam used by the merge pipeline, plans offset-based pages
//! over a store, and computes progress figures.
//!
//! Boundaries:
//! - No scheduling or concurrency (lives in `tilemerge-pipeline`).
//! - Store operations are blocking.
#![forbid(unsafe_code)]

mod page;
mod progress;
pub mod store;
mod tile;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use page::{Page, PagePlan};
pub use progress::ProgressSnapshot;
pub use store::{StoreError, TileStore};
#[cfg(feature = "store-sqlite")]
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteTileStore};
pub use tile::{TileCoordinate, TileId, TileRecord};
