//! Test-only helpers: an in-memory [`TileStore`] with fault injection and
//! SQLite fixture builders.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{Page, StoreError, TileCoordinate, TileId, TileRecord, TileStore};

#[derive(Debug, Default)]
struct MemoryTiles {
    coordinates: BTreeMap<TileCoordinate, TileId>,
    blobs: BTreeMap<TileId, Vec<u8>>,
    failing_ids: BTreeSet<TileId>,
    fail_fetch_at_offset: Option<u64>,
    fail_count: bool,
    fetched_pages: Vec<Page>,
    closed: usize,
}

/// In-memory tile store for tests.
///
/// Clones share state, so a test can hand one clone to the pipeline per
/// writer and inspect the result through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileStore {
    tiles: Arc<Mutex<MemoryTiles>>,
}

impl MemoryTileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `records`.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = TileRecord>,
    {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Seed a record directly, bypassing fault injection.
    ///
    /// A blob already present under the same hash is kept.
    pub fn insert(&self, record: TileRecord) {
        let mut tiles = self.lock();
        tiles
            .coordinates
            .insert(record.coordinate, record.tile_id.clone());
        tiles
            .blobs
            .entry(record.tile_id)
            .or_insert(record.tile_data);
    }

    /// Seed a coordinate that points at a hash with no blob row.
    ///
    /// The coordinate is counted but never returned by a page fetch.
    pub fn insert_dangling(&self, coordinate: TileCoordinate, tile_id: impl Into<TileId>) {
        self.lock().coordinates.insert(coordinate, tile_id.into());
    }

    /// Make every write involving `tile_id` fail.
    pub fn fail_writes_for(&self, tile_id: impl Into<TileId>) {
        self.lock().failing_ids.insert(tile_id.into());
    }

    /// Make page fetches at or beyond `offset` fail.
    pub fn fail_fetch_from_offset(&self, offset: u64) {
        self.lock().fail_fetch_at_offset = Some(offset);
    }

    /// Make [`TileStore::count`] fail.
    pub fn fail_count(&self) {
        self.lock().fail_count = true;
    }

    /// Coordinate table in scan order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<(TileCoordinate, TileId)> {
        self.lock()
            .coordinates
            .iter()
            .map(|(coordinate, id)| (*coordinate, id.clone()))
            .collect()
    }

    /// Blob table keyed by hash.
    #[must_use]
    pub fn blobs(&self) -> BTreeMap<TileId, Vec<u8>> {
        self.lock().blobs.clone()
    }

    /// Pages requested so far, in request order.
    #[must_use]
    pub fn fetched_pages(&self) -> Vec<Page> {
        self.lock().fetched_pages.clone()
    }

    /// How many clones of this store have been closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTiles> {
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_write(
        tiles: &MemoryTiles,
        tile_id: &TileId,
        operation: &'static str,
    ) -> Result<(), StoreError> {
        if tiles.failing_ids.contains(tile_id) {
            return Err(StoreError::Backend {
                operation,
                message: format!("injected failure for tile {tile_id}"),
            });
        }
        Ok(())
    }
}

impl TileStore for MemoryTileStore {
    fn count(&self) -> Result<u64, StoreError> {
        let tiles = self.lock();
        if tiles.fail_count {
            return Err(StoreError::Backend {
                operation: "count tiles",
                message: "injected count failure".to_owned(),
            });
        }
        Ok(u64::try_from(tiles.coordinates.len()).unwrap_or(u64::MAX))
    }

    fn fetch_page(&self, page: Page) -> Result<Vec<TileRecord>, StoreError> {
        let mut tiles = self.lock();
        tiles.fetched_pages.push(page);
        if tiles
            .fail_fetch_at_offset
            .is_some_and(|offset| page.offset >= offset)
        {
            return Err(StoreError::Backend {
                operation: "fetch tile page",
                message: format!("injected failure at offset {}", page.offset),
            });
        }
        let skip = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let records = tiles
            .coordinates
            .iter()
            .skip(skip)
            .take(take)
            .filter_map(|(coordinate, id)| {
                tiles
                    .blobs
                    .get(id)
                    .map(|data| TileRecord::new(*coordinate, id.clone(), data.clone()))
            })
            .collect();
        Ok(records)
    }

    fn upsert_blob(&self, tile_id: &TileId, tile_data: &[u8]) -> Result<(), StoreError> {
        let mut tiles = self.lock();
        Self::check_write(&tiles, tile_id, "insert tile blob")?;
        tiles
            .blobs
            .entry(tile_id.clone())
            .or_insert_with(|| tile_data.to_vec());
        Ok(())
    }

    fn upsert_coordinate(
        &self,
        coordinate: TileCoordinate,
        tile_id: &TileId,
    ) -> Result<(), StoreError> {
        let mut tiles = self.lock();
        Self::check_write(&tiles, tile_id, "insert tile coordinate")?;
        tiles.coordinates.insert(coordinate, tile_id.clone());
        Ok(())
    }

    fn close(self) -> Result<(), StoreError> {
        self.lock().closed += 1;
        Ok(())
    }
}

#[cfg(feature = "store-sqlite")]
pub use self::sqlite::{
    create_tile_database, create_tile_database_without_blob_index, insert_dangling_coordinate,
    insert_records, read_blobs, read_coordinates,
};

#[cfg(feature = "store-sqlite")]
mod sqlite {
    use std::{collections::BTreeMap, path::Path};

    use rusqlite::Connection;

    use crate::{TileCoordinate, TileId, TileRecord};

    const TILE_TABLES: &str = "CREATE TABLE map (
            zoom_level INTEGER,
            tile_column INTEGER,
            tile_row INTEGER,
            tile_id TEXT,
            grid_id TEXT
        );
        CREATE UNIQUE INDEX map_index ON map (zoom_level, tile_column, tile_row);
        CREATE TABLE images (
            tile_data BLOB,
            tile_id TEXT
        );";

    /// Create an empty MBTiles-style database with `map` and `images` tables.
    pub fn create_tile_database(path: &Path) -> rusqlite::Result<()> {
        let connection = Connection::open(path)?;
        connection.execute_batch(TILE_TABLES)?;
        connection.execute_batch("CREATE UNIQUE INDEX images_id ON images (tile_id);")
    }

    /// Create a tile database whose `images` table has no unique index on
    /// `tile_id`, so duplicate hashes are only prevented by the writer.
    pub fn create_tile_database_without_blob_index(path: &Path) -> rusqlite::Result<()> {
        Connection::open(path)?.execute_batch(TILE_TABLES)
    }

    /// Add a `map` row whose `tile_id` has no matching `images` row.
    pub fn insert_dangling_coordinate(
        path: &Path,
        coordinate: TileCoordinate,
        tile_id: &str,
    ) -> rusqlite::Result<()> {
        Connection::open(path)?.execute(
            "INSERT INTO map (zoom_level, tile_column, tile_row, tile_id) \
             VALUES (?1, ?2, ?3, ?4)",
            (
                coordinate.zoom_level,
                coordinate.tile_column,
                coordinate.tile_row,
                tile_id,
            ),
        )?;
        Ok(())
    }

    /// Seed `records` into an existing tile database.
    pub fn insert_records(path: &Path, records: &[TileRecord]) -> rusqlite::Result<()> {
        let mut connection = Connection::open(path)?;
        let transaction = connection.transaction()?;
        for record in records {
            transaction.execute(
                "INSERT INTO images (tile_id, tile_data) SELECT ?1, ?2 \
                 WHERE NOT EXISTS (SELECT 1 FROM images WHERE tile_id = ?1)",
                (record.tile_id.as_str(), record.tile_data.as_slice()),
            )?;
            transaction.execute(
                "INSERT OR REPLACE INTO map (zoom_level, tile_column, tile_row, tile_id) \
                 VALUES (?1, ?2, ?3, ?4)",
                (
                    record.coordinate.zoom_level,
                    record.coordinate.tile_column,
                    record.coordinate.tile_row,
                    record.tile_id.as_str(),
                ),
            )?;
        }
        transaction.commit()
    }

    /// Read the coordinate table in scan order.
    pub fn read_coordinates(path: &Path) -> rusqlite::Result<Vec<(TileCoordinate, TileId)>> {
        let connection = Connection::open(path)?;
        let mut statement = connection.prepare(
            "SELECT zoom_level, tile_column, tile_row, tile_id FROM map \
             ORDER BY zoom_level, tile_column, tile_row",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                TileCoordinate::new(row.get(0)?, row.get(1)?, row.get(2)?),
                TileId::new(row.get::<_, String>(3)?),
            ))
        })?;
        rows.collect()
    }

    /// Read the blob table keyed by hash.
    ///
    /// Duplicate hashes collapse into one entry; count rows with SQL when
    /// checking deduplication.
    pub fn read_blobs(path: &Path) -> rusqlite::Result<BTreeMap<TileId, Vec<u8>>> {
        let connection = Connection::open(path)?;
        let mut statement = connection.prepare("SELECT tile_id, tile_data FROM images")?;
        let rows = statement.query_map([], |row| {
            Ok((TileId::new(row.get::<_, String>(0)?), row.get(1)?))
        })?;
        rows.collect()
    }
}
