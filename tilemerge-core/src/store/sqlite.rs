//! SQLite-backed tile store using the normalized MBTiles layout.
//!
//! Coordinates live in the `map` table and tile images in `images`, joined on
//! `tile_id`. The adapter never creates either table.

use std::{path::Path, time::Duration};

use rusqlite::{Connection, OpenFlags, TransactionBehavior};

use super::{StoreError, TileStore};
use crate::{Page, TileCoordinate, TileId, TileRecord};

/// How long a write waits for another connection to release the database
/// lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COUNT_TILES: &str = "SELECT COUNT(*) FROM map";

const SELECT_PAGE: &str = "SELECT map.zoom_level, map.tile_column, map.tile_row, map.tile_id, \
                           images.tile_data \
                           FROM map JOIN images ON images.tile_id = map.tile_id \
                           ORDER BY map.zoom_level, map.tile_column, map.tile_row \
                           LIMIT ?1 OFFSET ?2";

// Written without `OR IGNORE` so that stores lacking a unique index on
// `images.tile_id` still hold one row per hash.
const INSERT_BLOB: &str = "INSERT INTO images (tile_id, tile_data) \
                           SELECT ?1, ?2 \
                           WHERE NOT EXISTS (SELECT 1 FROM images WHERE tile_id = ?1)";

const UPDATE_COORDINATE: &str = "UPDATE map SET tile_id = ?4 \
                                 WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3";

const INSERT_COORDINATE: &str =
    "INSERT INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (?1, ?2, ?3, ?4)";

type RawRow = (i64, i64, i64, String, Vec<u8>);

/// Tile store backed by a single SQLite connection.
///
/// Open one adapter per thread: the connection is [`Send`] but not shared.
#[derive(Debug)]
pub struct SqliteTileStore {
    connection: Connection,
}

impl SqliteTileStore {
    /// Open an existing store for reading and writing.
    ///
    /// `busy_timeout` bounds how long a write waits on another connection's
    /// lock. The file must already exist; it is never created.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let store = Self::open_with_flags(path.as_ref(), flags)?;
        store
            .connection
            .busy_timeout(busy_timeout)
            .map_err(|source| StoreError::Sqlite {
                operation: "configure busy timeout",
                source,
            })?;
        Ok(store)
    }

    /// Open an existing store without write access.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::open_with_flags(path.as_ref(), flags)
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self, StoreError> {
        let connection =
            Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { connection })
    }
}

impl TileStore for SqliteTileStore {
    fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row(COUNT_TILES, [], |row| row.get(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "count tiles",
                source,
            })?;
        from_sql_integer("tile count", count)
    }

    fn fetch_page(&self, page: Page) -> Result<Vec<TileRecord>, StoreError> {
        let limit = to_sql_integer("page limit", page.limit)?;
        let offset = to_sql_integer("page offset", page.offset)?;
        let mut statement =
            self.connection
                .prepare_cached(SELECT_PAGE)
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare page query",
                    source,
                })?;
        let rows = statement
            .query_map((limit, offset), |row| -> rusqlite::Result<RawRow> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(|source| StoreError::Sqlite {
                operation: "fetch tile page",
                source,
            })?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|source| StoreError::Sqlite {
                operation: "read tile row",
                source,
            })?;
            records.push(record_from_row(raw)?);
        }
        Ok(records)
    }

    fn upsert_blob(&self, tile_id: &TileId, tile_data: &[u8]) -> Result<(), StoreError> {
        insert_blob(&self.connection, tile_id, tile_data)
    }

    fn upsert_coordinate(
        &self,
        coordinate: TileCoordinate,
        tile_id: &TileId,
    ) -> Result<(), StoreError> {
        put_coordinate(&self.connection, coordinate, tile_id)
    }

    fn merge_tile(&mut self, record: &TileRecord) -> Result<(), StoreError> {
        // Immediate transactions take the write lock up front, so concurrent
        // writers wait in the busy handler instead of failing on upgrade.
        let transaction = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::Sqlite {
                operation: "begin tile transaction",
                source,
            })?;
        insert_blob(&transaction, &record.tile_id, &record.tile_data)?;
        put_coordinate(&transaction, record.coordinate, &record.tile_id)?;
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit tile transaction",
            source,
        })
    }

    fn close(self) -> Result<(), StoreError> {
        self.connection
            .close()
            .map_err(|(_, source)| StoreError::Sqlite {
                operation: "close tile store",
                source,
            })
    }
}

fn insert_blob(
    connection: &Connection,
    tile_id: &TileId,
    tile_data: &[u8],
) -> Result<(), StoreError> {
    let mut statement =
        connection
            .prepare_cached(INSERT_BLOB)
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare blob insert",
                source,
            })?;
    statement
        .execute((tile_id.as_str(), tile_data))
        .map(|_| ())
        .map_err(|source| StoreError::Sqlite {
            operation: "insert tile blob",
            source,
        })
}

fn put_coordinate(
    connection: &Connection,
    coordinate: TileCoordinate,
    tile_id: &TileId,
) -> Result<(), StoreError> {
    let params = (
        coordinate.zoom_level,
        coordinate.tile_column,
        coordinate.tile_row,
        tile_id.as_str(),
    );
    let mut update =
        connection
            .prepare_cached(UPDATE_COORDINATE)
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare coordinate update",
                source,
            })?;
    let changed = update.execute(params).map_err(|source| StoreError::Sqlite {
        operation: "update tile coordinate",
        source,
    })?;
    if changed > 0 {
        return Ok(());
    }

    let mut insert =
        connection
            .prepare_cached(INSERT_COORDINATE)
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare coordinate insert",
                source,
            })?;
    insert
        .execute(params)
        .map(|_| ())
        .map_err(|source| StoreError::Sqlite {
            operation: "insert tile coordinate",
            source,
        })
}

fn record_from_row(
    (zoom_level, tile_column, tile_row, tile_id, tile_data): RawRow,
) -> Result<TileRecord, StoreError> {
    let coordinate = TileCoordinate::new(
        to_u32("zoom_level", zoom_level)?,
        to_u32("tile_column", tile_column)?,
        to_u32("tile_row", tile_row)?,
    );
    Ok(TileRecord::new(coordinate, tile_id, tile_data))
}

fn to_u32(what: &'static str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::OutOfRange {
        what,
        value: i128::from(value),
    })
}

fn from_sql_integer(what: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::OutOfRange {
        what,
        value: i128::from(value),
    })
}

fn to_sql_integer(what: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange {
        what,
        value: i128::from(value),
    })
}
