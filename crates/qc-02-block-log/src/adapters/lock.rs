//! # Block Log Process Lock
//!
//! Prevents two processes from appending to the same block log.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows). The lock lives in `<block_log>.lock` and holds the owner's PID
//! for error messages. Read-only opens never lock.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from block log locking.
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock file could not be created or written.
    #[error("Failed to create lock file {}: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another process holds the lock.
    #[error("Block log already in use{} ({})", pid.map(|p| format!(" by process {}", p)).unwrap_or_default(), path.display())]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },
}

/// Exclusive lock on a block log, released on drop.
///
/// The lock file itself is never removed: every process must contend on the
/// same inode.
pub struct BlockLogLock {
    /// Kept open to hold the lock.
    file: File,
    path: PathBuf,
}

impl BlockLogLock {
    /// Path of the lock file guarding `block_log`.
    pub fn lock_path(block_log: &Path) -> PathBuf {
        let mut name = block_log.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock without waiting.
    pub fn acquire(block_log: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(block_log);
        let create_failed = |source| LockError::CreateFailed {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(create_failed)?;

        if file.try_lock_exclusive().is_err() {
            let pid = std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse().ok());
            return Err(LockError::AlreadyLocked {
                pid,
                path: path.clone(),
            });
        }

        file.set_len(0).map_err(create_failed)?;
        writeln!(file, "{}", std::process::id()).map_err(create_failed)?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BlockLogLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = FileExt::unlock(&self.file);
    }
}
