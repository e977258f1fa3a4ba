//! Working directory management.
//!
//! A writer owns its working directory exclusively for the lifetime of the
//! recording session:
//!
//! ```text
//! <workdir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ chunk-000000.dat  # Sorted spill chunks (transient)
//! ├─ chunk-000001.dat
//! └─ ...
//! ```
//!
//! The LOCK file ensures two writer instances never interleave chunks in
//! the same directory. Chunk files are scratch space only - they are not
//! part of the artifact contract and are deleted after a successful
//! finalize.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Lock file name within the working directory.
const LOCK_FILE: &str = "LOCK";

/// An exclusively owned scratch directory for chunk spilling.
///
/// Only one `Workdir` instance can exist per directory at a time; the
/// advisory lock is released when the instance is dropped.
#[derive(Debug)]
pub(crate) struct Workdir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl Workdir {
    /// Opens a working directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another writer holds the lock (returns `WorkdirLocked`)
    /// - I/O errors occur
    pub(crate) fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_state(format!(
                "working directory path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::WorkdirLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the working directory.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path for the chunk with the given id.
    pub(crate) fn chunk_path(&self, id: u64) -> PathBuf {
        self.path.join(format!("chunk-{id:06}.dat"))
    }

    /// Deletes the given chunk files, best effort.
    ///
    /// A chunk that cannot be removed is logged and skipped; leftover
    /// scratch files do not affect the finalized artifact.
    pub(crate) fn remove_chunks(&self, ids: &[u64]) {
        for &id in ids {
            let path = self.chunk_path(id);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove chunk file");
            }
        }
    }
}
