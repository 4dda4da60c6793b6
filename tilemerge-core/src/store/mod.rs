//! Data access traits for tile stores.
//!
//! The [`TileStore`] trait is the seam between the merge pipeline and the
//! storage engine. A store holds a coordinate table mapping each
//! [`TileCoordinate`] to a [`TileId`], and a blob table holding the bytes for
//! each distinct [`TileId`].
//!
//! Every operation blocks the calling thread. Async callers must run them on
//! a blocking pool.

mod error;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use error::StoreError;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteTileStore};

use crate::{Page, TileCoordinate, TileId, TileRecord};

/// Access to one normalized tile store.
///
/// Implementations are moved onto blocking worker threads, so they must be
/// [`Send`]. They need not be [`Sync`]: each pipeline stage owns its own
/// adapter.
pub trait TileStore: Send {
    /// Number of rows in the coordinate table.
    fn count(&self) -> Result<u64, StoreError>;

    /// Read up to `page.limit` records in coordinate order, skipping the
    /// first `page.offset` rows. An empty result is valid.
    fn fetch_page(&self, page: Page) -> Result<Vec<TileRecord>, StoreError>;

    /// Insert the blob unless a row with `tile_id` already exists.
    ///
    /// Existing blobs are never overwritten.
    fn upsert_blob(&self, tile_id: &TileId, tile_data: &[u8]) -> Result<(), StoreError>;

    /// Point `coordinate` at `tile_id`, inserting the row when absent.
    fn upsert_coordinate(
        &self,
        coordinate: TileCoordinate,
        tile_id: &TileId,
    ) -> Result<(), StoreError>;

    /// Apply one record: the blob first, then the coordinate.
    ///
    /// Adapters with transactions should override this to make the pair
    /// atomic.
    fn merge_tile(&mut self, record: &TileRecord) -> Result<(), StoreError> {
        self.upsert_blob(&record.tile_id, &record.tile_data)?;
        self.upsert_coordinate(record.coordinate, &record.tile_id)
    }

    /// Release the underlying connection.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
