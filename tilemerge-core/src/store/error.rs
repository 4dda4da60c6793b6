//! Errors raised by tile store adapters.

#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`TileStore`](super::TileStore) operation.
///
/// Adapters never retry; the error carries the underlying cause so callers
/// decide whether the failure is fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open tile store at {path:?}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A query or statement against the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation}")]
    Sqlite {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A stored or requested integer does not fit the tile model.
    #[error("{what} value {value} is outside the supported range")]
    OutOfRange {
        /// Column or argument that failed the conversion.
        what: &'static str,
        /// Offending value.
        value: i128,
    },
    /// A non-SQLite backend rejected the operation.
    #[error("failed to {operation}: {message}")]
    Backend {
        /// Description of the failed operation.
        operation: &'static str,
        /// Backend-specific explanation.
        message: String,
    },
}
