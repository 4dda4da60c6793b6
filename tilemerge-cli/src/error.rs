//! Error types emitted by the tilemerge CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use tilemerge_pipeline::MergeError;

/// Errors emitted by the tilemerge CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[source] Arc<ortho_config::OrthoError>),
    /// A required argument is missing after configuration merging.
    #[error("missing <{field}> argument (pass it positionally or set {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A numeric option was set to zero.
    #[error("--{field} must be at least 1")]
    ZeroValue { field: &'static str },
    /// A referenced store path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingStoreFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced store path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    StorePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced store path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}")]
    InspectStorePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The Tokio runtime could not be started.
    #[error("failed to start the async runtime")]
    Runtime(#[source] std::io::Error),
    /// The merge itself failed.
    #[error("merge failed")]
    Merge(#[from] MergeError),
}

impl CliError {
    /// Whether the usage line should accompany this error.
    #[must_use]
    pub const fn wants_usage(&self) -> bool {
        matches!(self, Self::MissingArgument { .. } | Self::ZeroValue { .. })
    }
}
