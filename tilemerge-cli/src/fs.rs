//! Capability-based file checks for store paths.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};

/// Return whether `path` exists and is a regular file.
///
/// A missing parent directory surfaces as [`io::ErrorKind::NotFound`].
pub(crate) fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "path has no file name"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("temp path is UTF-8")
    }

    #[rstest]
    fn regular_file_is_a_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = utf8(&dir, "tiles.mbtiles");
        fs::write(&path, b"sqlite").expect("write file");
        assert!(file_is_file(&path).expect("inspect file"));
    }

    #[rstest]
    fn directory_is_not_a_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = utf8(&dir, "nested");
        fs::create_dir(&path).expect("create dir");
        assert!(!file_is_file(&path).expect("inspect dir"));
    }

    #[rstest]
    #[case("missing.mbtiles")]
    #[case("missing-dir/tiles.mbtiles")]
    fn missing_paths_are_not_found(#[case] name: &str) {
        let dir = TempDir::new().expect("tempdir");
        let err = file_is_file(&utf8(&dir, name)).expect_err("path is missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
