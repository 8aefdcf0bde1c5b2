//! Lock file guarding a header store against a second writer process.
//!
//! The lock lives next to the store (`blockchain_headers.lock`) and holds the
//! PID of the owning process. The file is only rewritten once the lock is
//! held, so a refused open never clobbers the owner's PID.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

/// Exclusive lock held for as long as a store is open.
pub(super) struct LockFile {
    path: PathBuf,
    _file: File,
}

impl LockFile {
    pub(super) fn acquire(path: PathBuf) -> StorageResult<Self> {
        let unavailable = |source| StorageError::Unavailable {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(unavailable)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                let owner = read_owner(&mut file).unwrap_or_else(|| "unknown".to_string());
                return Err(StorageError::DirectoryLocked(format!(
                    "header store lock {} is already held by process {}",
                    path.display(),
                    owner
                )));
            }
            Err(TryLockError::Error(source)) => return Err(unavailable(source)),
        }

        if let Err(e) = claim(&mut file) {
            tracing::warn!("Could not record PID in {:?}: {}", path, e);
        }

        Ok(Self {
            path,
            _file: file,
        })
    }
}

/// Replaces the lock file's contents with this process's PID.
fn claim(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_data()
}

fn read_owner(file: &mut File) -> Option<String> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let owner = contents.trim();
    (!owner.is_empty()).then(|| owner.to_string())
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock file {:?}: {}", self.path, e);
        }
    }
}
