//! Storage directory management.
//!
//! On-disk stores share this layout:
//!
//! ```text
//! <storage_path>/
//! ├─ LOCK              # Advisory lock for single-owner access
//! ├─ store.redb        # redb database file
//! └─ sled/             # sled database directory
//! ```
//!
//! Only the file of the selected engine is ever created.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const REDB_FILE: &str = "store.redb";
const SLED_DIR: &str = "sled";

/// An opened storage directory holding its exclusive lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub(crate) struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens (and optionally creates) the directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the directory is missing and
    /// `create_if_missing` is false or the path is not a directory,
    /// `Locked` if another store holds it, and `Io` otherwise.
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_operation(format!(
                    "storage directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_operation(format!(
                "storage path is not a directory: {}",
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
            return Err(StoreError::Locked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Path of the redb database file.
    pub(crate) fn redb_path(&self) -> PathBuf {
        self.path.join(REDB_FILE)
    }

    /// Path of the sled database directory.
    pub(crate) fn sled_path(&self) -> PathBuf {
        self.path.join(SLED_DIR)
    }
}
