//! Focused unit tests covering merge CLI configuration and execution.

use super::helpers::{StoreFiles, sample_tiles};
use super::*;
use clap::error::ErrorKind;
use rstest::{fixture, rstest};
use tilemerge_core::{TileCoordinate, TileId, test_support::read_coordinates};

#[fixture]
fn stores() -> StoreFiles {
    StoreFiles::new()
}

fn args_for(stores: &StoreFiles) -> MergeArgs {
    MergeArgs {
        source: Some(stores.source().to_path_buf()),
        destination: Some(stores.destination().to_path_buf()),
        ..MergeArgs::default()
    }
}

#[rstest]
#[case(None, Some(Utf8PathBuf::from("dest.mbtiles")), ARG_SOURCE, ENV_SOURCE)]
#[case(
    Some(Utf8PathBuf::from("source.mbtiles")),
    None,
    ARG_DESTINATION,
    ENV_DESTINATION
)]
fn converting_without_required_paths_errors(
    #[case] source: Option<Utf8PathBuf>,
    #[case] destination: Option<Utf8PathBuf>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = MergeArgs {
        source,
        destination,
        ..MergeArgs::default()
    };
    let err = MergeConfig::try_from(args).expect_err("missing path should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
    assert!(
        MergeConfig::try_from(MergeArgs::default())
            .expect_err("no paths")
            .wants_usage()
    );
}

#[rstest]
fn defaults_apply_when_options_are_absent(stores: StoreFiles) {
    let config = MergeConfig::try_from(args_for(&stores)).expect("valid config");
    assert_eq!(config.options, MergeOptions::default());
    assert_eq!(config.options.queue_capacity(), 4);
    assert_eq!(config.options.busy_timeout, tilemerge_core::DEFAULT_BUSY_TIMEOUT);
}

#[rstest]
fn flags_populate_merge_options() {
    let args = MergeArgs::try_parse_from([
        "tilemerge",
        "a.mbtiles",
        "b.mbtiles",
        "--read-batch",
        "500",
        "--write-concurrency",
        "3",
        "--progress-interval",
        "10",
        "--queue-depth",
        "7",
        "--busy-timeout-ms",
        "250",
    ])
    .expect("arguments parse");
    let config = MergeConfig::try_from(args).expect("valid config");

    assert_eq!(config.source, Utf8PathBuf::from("a.mbtiles"));
    assert_eq!(config.destination, Utf8PathBuf::from("b.mbtiles"));
    assert_eq!(config.options.read_batch.get(), 500);
    assert_eq!(config.options.write_concurrency.get(), 3);
    assert_eq!(config.options.progress_interval.get(), 10);
    assert_eq!(config.options.queue_capacity(), 7);
    assert_eq!(config.options.busy_timeout, Duration::from_millis(250));
}

#[rstest]
#[case("--read-batch", ARG_READ_BATCH)]
#[case("--write-concurrency", ARG_WRITE_CONCURRENCY)]
#[case("--progress-interval", ARG_PROGRESS_INTERVAL)]
#[case("--queue-depth", ARG_QUEUE_DEPTH)]
fn zero_values_are_rejected(#[case] flag: &str, #[case] expected: &'static str) {
    let args = MergeArgs::try_parse_from(["tilemerge", "a.mbtiles", "b.mbtiles", flag, "0"])
        .expect("zero parses as a number");
    match MergeConfig::try_from(args).expect_err("zero is invalid") {
        CliError::ZeroValue { field } => assert_eq!(field, expected),
        other => panic!("expected ZeroValue, found {other:?}"),
    }
}

#[rstest]
#[case(&["tilemerge", "--bogus"], ErrorKind::UnknownArgument)]
#[case(&["tilemerge", "--read-batch", "many"], ErrorKind::ValueValidation)]
#[case(&["tilemerge", "--help"], ErrorKind::DisplayHelp)]
#[case(&["tilemerge", "--version"], ErrorKind::DisplayVersion)]
fn clap_reports_parse_outcomes(#[case] argv: &[&str], #[case] kind: ErrorKind) {
    let err = MergeArgs::try_parse_from(argv).expect_err("clap short-circuits");
    assert_eq!(err.kind(), kind);
}

#[rstest]
fn usage_names_both_positionals() {
    let usage = usage();
    assert!(usage.contains("tilemerge"), "usage was {usage}");
    assert!(usage.contains("source-path"), "usage was {usage}");
    assert!(usage.contains("destination-path"), "usage was {usage}");
}

#[rstest]
fn validate_stores_reports_missing_files(stores: StoreFiles) {
    let config = MergeConfig {
        source: stores.source().to_path_buf(),
        destination: stores.source().with_file_name("missing.mbtiles"),
        options: MergeOptions::default(),
    };
    match config.validate_stores().expect_err("expected failure") {
        CliError::MissingStoreFile { field, .. } => assert_eq!(field, ARG_DESTINATION),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_stores_rejects_directories(stores: StoreFiles) {
    let config = MergeConfig {
        source: stores.not_a_file().to_path_buf(),
        destination: stores.destination().to_path_buf(),
        options: MergeOptions::default(),
    };
    match config
        .validate_stores()
        .expect_err("expected directory rejection")
    {
        CliError::StorePathNotFile { field, .. } => assert_eq!(field, ARG_SOURCE),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn execute_merges_source_into_destination(stores: StoreFiles) {
    let config = MergeConfig::try_from(args_for(&stores)).expect("valid config");
    config.validate_stores().expect("stores exist");

    let report = execute(&config).expect("merge succeeds");

    assert_eq!(report.total, 3);
    assert_eq!(report.merged, 3);
    assert!(report.is_complete());
    let coordinates =
        read_coordinates(stores.destination().as_std_path()).expect("read destination");
    let expected: Vec<_> = sample_tiles()
        .into_iter()
        .map(|record| (record.coordinate, record.tile_id))
        .collect();
    assert_eq!(coordinates, expected);
    assert_eq!(
        coordinates.first(),
        Some(&(TileCoordinate::new(0, 0, 0), TileId::from("hashA")))
    );
}

#[rstest]
fn merge_errors_render_their_cause(stores: StoreFiles) {
    let mut config = MergeConfig::try_from(args_for(&stores)).expect("valid config");
    config.destination = stores.source().with_file_name("vanished.mbtiles");

    let err = execute(&config).expect_err("destination is missing");
    let rendered = tilemerge_pipeline::ErrorChain(&err).to_string();
    assert!(
        rendered.starts_with("merge failed: failed to open destination store for writer 0"),
        "rendered {rendered}"
    );
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(future)
}

#[rstest]
fn first_interrupt_cancels_and_second_aborts() {
    let cancel = CancellationToken::new();
    let mut signals = 0;
    let outcome = block_on(watch_interrupts(
        || {
            signals += 1;
            std::future::ready(Ok(()))
        },
        cancel.clone(),
    ));

    assert_eq!(outcome, Interrupt::Abort);
    assert_eq!(signals, 2);
    assert!(cancel.is_cancelled());
}

#[rstest]
fn listener_failure_leaves_the_merge_running() {
    let cancel = CancellationToken::new();
    let outcome = block_on(watch_interrupts(
        || std::future::ready(Err(io::Error::other("no signal handler"))),
        cancel.clone(),
    ));

    assert_eq!(outcome, Interrupt::Unavailable);
    assert!(!cancel.is_cancelled());
}
