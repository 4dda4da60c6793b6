//! Tile addressing and payload types shared by every store.

use std::fmt;

/// Position of a tile inside a tiled map pyramid.
///
/// Coordinates order by zoom level first, then column, then row. This is the
/// scan order used when paging through a store.
///
/// # Examples
///
/// ```
/// use tilemerge_core::TileCoordinate;
///
/// let parent = TileCoordinate::new(0, 0, 0);
/// let child = TileCoordinate::new(1, 0, 0);
/// assert!(parent < child);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoordinate {
    /// Zoom level of the tile.
    pub zoom_level: u32,
    /// Column within the zoom level.
    pub tile_column: u32,
    /// Row within the zoom level.
    pub tile_row: u32,
}

impl TileCoordinate {
    /// Build a coordinate from its three components.
    #[must_use]
    pub const fn new(zoom_level: u32, tile_column: u32, tile_row: u32) -> Self {
        Self {
            zoom_level,
            tile_column,
            tile_row,
        }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom_level, self.tile_column, self.tile_row)
    }
}

/// Content hash under which a tile image is stored exactly once.
///
/// The value is opaque: stores choose it so that equal bytes imply an equal
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(String);

impl TileId {
    /// Wrap a raw identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the raw identifier.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for TileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TileId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coordinate joined with the blob it points at, as read from a store.
///
/// Records live for one pass through the merge pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    /// Where the tile sits in the pyramid.
    pub coordinate: TileCoordinate,
    /// Content hash of the tile image.
    pub tile_id: TileId,
    /// Encoded tile image.
    pub tile_data: Vec<u8>,
}

impl TileRecord {
    /// Assemble a record from its parts.
    pub fn new(coordinate: TileCoordinate, tile_id: impl Into<TileId>, tile_data: Vec<u8>) -> Self {
        Self {
            coordinate,
            tile_id: tile_id.into(),
            tile_data,
        }
    }
}
