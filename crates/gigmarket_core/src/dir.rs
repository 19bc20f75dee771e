//! Store directory management.
//!
//! ```text
//! <path>/
//! ├─ LOCK          # advisory lock, one process at a time
//! └─ market.wal    # write-ahead log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "market.wal";

/// An exclusively locked store directory.
///
/// The lock is held until the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens (or creates) a store directory and locks it.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the directory is missing and
    ///   `create_if_missing` is false, or if `path` is not a directory
    /// - `StoreLocked` if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// The directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the write-ahead log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        Self::log_path_in(&self.path)
    }

    /// Path the write-ahead log has inside directory `path`, without locking it.
    #[must_use]
    pub fn log_path_in(path: &Path) -> PathBuf {
        path.join(LOG_FILE)
    }
}
