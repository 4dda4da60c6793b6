//! Test helpers for composing store files and layered overrides.

use super::*;
use std::fs;
use tempfile::TempDir;
use tilemerge_core::{
    TileCoordinate, TileRecord,
    test_support::{create_tile_database, insert_records},
};

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) source: Option<Utf8PathBuf>,
    pub(super) destination: Option<Utf8PathBuf>,
    pub(super) read_batch: Option<u64>,
    pub(super) write_concurrency: Option<usize>,
}

/// Tile databases in a temporary directory, one per configuration layer.
#[derive(Debug)]
pub(super) struct StoreFiles {
    _dir: TempDir,
    cli_source: Utf8PathBuf,
    cli_destination: Utf8PathBuf,
    config_source: Utf8PathBuf,
    config_destination: Utf8PathBuf,
    env_destination: Utf8PathBuf,
    not_a_file: Utf8PathBuf,
}

impl StoreFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 tempdir");
        let cli_source = root.join("cli-source.mbtiles");
        let cli_destination = root.join("cli-destination.mbtiles");
        let config_source = root.join("config-source.mbtiles");
        let config_destination = root.join("config-destination.mbtiles");
        let env_destination = root.join("env-destination.mbtiles");
        for path in [
            &cli_source,
            &cli_destination,
            &config_source,
            &config_destination,
            &env_destination,
        ] {
            create_tile_database(path.as_std_path()).expect("create tile database");
        }
        insert_records(cli_source.as_std_path(), &sample_tiles()).expect("seed source");
        let not_a_file = root.join("stores");
        fs::create_dir(&not_a_file).expect("create directory");
        Self {
            _dir: dir,
            cli_source,
            cli_destination,
            config_source,
            config_destination,
            env_destination,
            not_a_file,
        }
    }

    pub(super) fn source(&self) -> &Utf8Path {
        &self.cli_source
    }

    pub(super) fn destination(&self) -> &Utf8Path {
        &self.cli_destination
    }

    pub(super) fn config_source(&self) -> &Utf8Path {
        &self.config_source
    }

    pub(super) fn config_destination(&self) -> &Utf8Path {
        &self.config_destination
    }

    pub(super) fn env_destination(&self) -> &Utf8Path {
        &self.env_destination
    }

    pub(super) fn not_a_file(&self) -> &Utf8Path {
        &self.not_a_file
    }
}

/// Three tiles, two sharing an image.
pub(super) fn sample_tiles() -> Vec<TileRecord> {
    vec![
        TileRecord::new(TileCoordinate::new(0, 0, 0), "hashA", b"x".to_vec()),
        TileRecord::new(TileCoordinate::new(0, 1, 0), "hashA", b"x".to_vec()),
        TileRecord::new(TileCoordinate::new(1, 0, 0), "hashB", b"y".to_vec()),
    ]
}

/// Resolve `cli_args` after filling gaps from the environment layer, then
/// from the file layer.
pub(super) fn merge_layers(
    mut cli_args: MergeArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<MergeConfig, CliError> {
    merge_field(
        &mut cli_args.source,
        extract_field(env_layer.as_ref(), |layer| &layer.source),
        extract_field(file_layer.as_ref(), |layer| &layer.source),
    );
    merge_field(
        &mut cli_args.destination,
        extract_field(env_layer.as_ref(), |layer| &layer.destination),
        extract_field(file_layer.as_ref(), |layer| &layer.destination),
    );
    merge_field(
        &mut cli_args.read_batch,
        extract_field(env_layer.as_ref(), |layer| &layer.read_batch),
        extract_field(file_layer.as_ref(), |layer| &layer.read_batch),
    );
    merge_field(
        &mut cli_args.write_concurrency,
        extract_field(env_layer.as_ref(), |layer| &layer.write_concurrency),
        extract_field(file_layer.as_ref(), |layer| &layer.write_concurrency),
    );
    MergeConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: Option<&LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.and_then(|entry| accessor(entry).clone())
}
