//! Command-line interface for merging tile stores.
#![forbid(unsafe_code)]

use std::{
    future::Future,
    io,
    num::{NonZeroU64, NonZeroUsize},
    process,
    sync::Arc,
    time::Duration,
};

use camino::{Utf8Path, Utf8PathBuf};
use clap::{CommandFactory, Parser};
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tilemerge_pipeline::{CancellationToken, LogProgress, MergeOptions, MergeReport, merge_paths};
use tokio::runtime::Builder;

mod error;
mod fs;

pub use error::CliError;

const ARG_SOURCE: &str = "source";
const ARG_DESTINATION: &str = "destination";
const ARG_READ_BATCH: &str = "read-batch";
const ARG_WRITE_CONCURRENCY: &str = "write-concurrency";
const ARG_PROGRESS_INTERVAL: &str = "progress-interval";
const ARG_QUEUE_DEPTH: &str = "queue-depth";
const ARG_BUSY_TIMEOUT_MS: &str = "busy-timeout-ms";
const ENV_SOURCE: &str = "TILEMERGE_CMDS_TILEMERGE_SOURCE";
const ENV_DESTINATION: &str = "TILEMERGE_CMDS_TILEMERGE_DESTINATION";
/// Conventional exit status for a process ended by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// Run the tilemerge CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments are invalid, a store path is missing,
/// or the merge fails.
pub fn run() -> Result<MergeReport, CliError> {
    let args = MergeArgs::try_parse().map_err(CliError::ArgumentParsing)?;
    run_merge(args)
}

/// One-line usage summary for error output.
#[must_use]
pub fn usage() -> String {
    MergeArgs::command().render_usage().to_string()
}

fn run_merge(args: MergeArgs) -> Result<MergeReport, CliError> {
    let config = args.into_config()?;
    config.validate_stores()?;
    execute(&config)
}

fn execute(config: &MergeConfig) -> Result<MergeReport, CliError> {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    info!("merging {} into {}", config.source, config.destination);
    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let watched = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if watch_interrupts(tokio::signal::ctrl_c, watched).await == Interrupt::Abort {
                process::exit(EXIT_INTERRUPTED);
            }
        });
        let outcome = merge_paths(
            &config.source,
            &config.destination,
            &config.options,
            Arc::new(LogProgress),
            cancel,
        )
        .await;
        interrupt.abort();
        outcome
    })?;
    if !report.is_complete() {
        warn!(
            "{} of {} tiles did not reach the destination ({} skipped, {} unread)",
            report.skipped.saturating_add(report.unread),
            report.total,
            report.skipped,
            report.unread
        );
    }
    Ok(report)
}

/// What the interrupt watcher saw before it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// The signal listener failed; the merge runs to completion.
    Unavailable,
    /// A second interrupt arrived while the merge was draining.
    Abort,
}

/// Cancel the merge on the first interrupt and ask for an immediate exit on
/// the second.
async fn watch_interrupts<S, F>(mut interrupted: S, cancel: CancellationToken) -> Interrupt
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = interrupted().await {
        warn!("cannot listen for interrupts: {err}");
        return Interrupt::Unavailable;
    }
    warn!("interrupt received; draining queued tiles before stopping (interrupt again to abort)");
    cancel.cancel();
    match interrupted().await {
        Ok(()) => {
            warn!("second interrupt received; aborting without draining");
            Interrupt::Abort
        }
        Err(err) => {
            warn!("cannot listen for interrupts: {err}");
            Interrupt::Unavailable
        }
    }
}

/// CLI arguments for a merge run.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "tilemerge",
    version,
    about = "Merge one tile store into another",
    long_about = "Copy every tile of the source store into the destination \
                  store. Identical images are stored once; tiles already at \
                  the same coordinate in the destination are replaced. \
                  Options can come from CLI flags, configuration files, or \
                  environment variables."
)]
#[ortho_config(prefix = "TILEMERGE")]
pub struct MergeArgs {
    /// Path to the store to read tiles from.
    #[arg(value_name = "source-path")]
    #[serde(default)]
    source: Option<Utf8PathBuf>,
    /// Path to the store to merge tiles into.
    #[arg(value_name = "destination-path")]
    #[serde(default)]
    destination: Option<Utf8PathBuf>,
    /// Tiles fetched from the source per page [default: 1].
    #[arg(long = ARG_READ_BATCH, value_name = "N")]
    #[serde(default)]
    read_batch: Option<u64>,
    /// Concurrent writers, each with its own destination connection
    /// [default: 1].
    #[arg(long = ARG_WRITE_CONCURRENCY, value_name = "N")]
    #[serde(default)]
    write_concurrency: Option<usize>,
    /// Merged tiles between progress lines [default: 1000].
    #[arg(long = ARG_PROGRESS_INTERVAL, value_name = "N")]
    #[serde(default)]
    progress_interval: Option<u64>,
    /// Tiles buffered between reader and writers [default: 4 per writer].
    #[arg(long = ARG_QUEUE_DEPTH, value_name = "N")]
    #[serde(default)]
    queue_depth: Option<usize>,
    /// Milliseconds a writer waits for the destination lock [default: 5000].
    #[arg(long = ARG_BUSY_TIMEOUT_MS, value_name = "ms")]
    #[serde(default)]
    busy_timeout_ms: Option<u64>,
}

impl MergeArgs {
    fn into_config(self) -> Result<MergeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MergeConfig::try_from(merged)
    }
}

/// Resolved merge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MergeConfig {
    source: Utf8PathBuf,
    destination: Utf8PathBuf,
    options: MergeOptions,
}

impl MergeConfig {
    fn validate_stores(&self) -> Result<(), CliError> {
        Self::require_existing(&self.source, ARG_SOURCE)?;
        Self::require_existing(&self.destination, ARG_DESTINATION)?;
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::StorePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingStoreFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectStorePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<MergeArgs> for MergeConfig {
    type Error = CliError;

    fn try_from(args: MergeArgs) -> Result<Self, Self::Error> {
        let source = args.source.ok_or(CliError::MissingArgument {
            field: ARG_SOURCE,
            env: ENV_SOURCE,
        })?;
        let destination = args.destination.ok_or(CliError::MissingArgument {
            field: ARG_DESTINATION,
            env: ENV_DESTINATION,
        })?;

        let read_batch = non_zero_u64(args.read_batch, ARG_READ_BATCH)?;
        let write_concurrency = non_zero_usize(args.write_concurrency, ARG_WRITE_CONCURRENCY)?;
        let mut options = MergeOptions::default()
            .with_read_batch(read_batch.unwrap_or(NonZeroU64::MIN))
            .with_write_concurrency(write_concurrency.unwrap_or(NonZeroUsize::MIN));
        if let Some(millis) = args.busy_timeout_ms {
            options = options.with_busy_timeout(Duration::from_millis(millis));
        }
        if let Some(interval) = non_zero_u64(args.progress_interval, ARG_PROGRESS_INTERVAL)? {
            options = options.with_progress_interval(interval);
        }
        if let Some(depth) = non_zero_usize(args.queue_depth, ARG_QUEUE_DEPTH)? {
            options = options.with_queue_depth(depth);
        }

        Ok(Self {
            source,
            destination,
            options,
        })
    }
}

fn non_zero_u64(value: Option<u64>, field: &'static str) -> Result<Option<NonZeroU64>, CliError> {
    value
        .map(|raw| NonZeroU64::new(raw).ok_or(CliError::ZeroValue { field }))
        .transpose()
}

fn non_zero_usize(
    value: Option<usize>,
    field: &'static str,
) -> Result<Option<NonZeroUsize>, CliError> {
    value
        .map(|raw| NonZeroUsize::new(raw).ok_or(CliError::ZeroValue { field }))
        .transpose()
}

#[cfg(test)]
mod tests;
