//! Test fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tether_core::SurfaceId;

/// Create a fresh surface id.
#[must_use]
pub fn test_surface_id() -> SurfaceId {
    SurfaceId::new()
}

/// A TOML config file in its own temporary directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct TestConfigFile {
    dir: TempDir,
    path: PathBuf,
}

impl TestConfigFile {
    /// Write `contents` to `tether.toml` in a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating the directory or writing the file.
    pub fn new(contents: &str) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("tether.toml");
        fs::write(&path, contents)?;
        Ok(Self { dir, path })
    }

    /// Path of the config file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
