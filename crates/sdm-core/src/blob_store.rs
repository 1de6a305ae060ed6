//! Durable placement of finished downloads.
//!
//! The manager hands the transport's staged file to a [`BlobStore`] together
//! with the transfer's display name. Persisting the same name again replaces
//! the earlier content. Different names may be persisted concurrently.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PersistError;

/// Capability to durably store a completed transfer's bytes under a name.
pub trait BlobStore: Send + Sync + 'static {
    /// Moves `local` into the store as `name`, overwriting existing content.
    /// Returns where the bytes now live.
    fn persist(&self, local: &Path, name: &str) -> Result<PathBuf, PersistError>;
}

/// [`BlobStore`] that moves files into a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn place(&self, local: &Path, dest: &Path) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        if dest.exists() {
            tracing::debug!(path = %dest.display(), "replacing existing file");
        }
        // rename(2) swaps the entry atomically, so `dest` is never missing.
        match fs::rename(local, dest) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
            // Staging and download dirs may sit on different filesystems.
            Err(e) => copy_then_remove(local, dest).map_err(|_| e),
        }
    }
}

fn copy_then_remove(local: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(local, dest)?;
    fs::File::open(dest)?.sync_all()?;
    fs::remove_file(local)
}

impl BlobStore for FsBlobStore {
    fn persist(&self, local: &Path, name: &str) -> Result<PathBuf, PersistError> {
        let dest = self.dir.join(name);
        self.place(local, &dest).map_err(|source| PersistError {
            name: name.to_string(),
            source,
        })?;
        tracing::info!(path = %dest.display(), "saved download");
        Ok(dest)
    }
}
