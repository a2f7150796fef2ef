//! Exclusive working tree lock
//!
//! Only one run may mutate a working tree at a time. Stores hand out a
//! [`TreeLock`] guard; taking it never blocks, and a second attempt while the
//! guard is alive fails with [`LockError::AlreadyLocked`]. The guard releases
//! the lock when dropped.
//!
//! Two backings exist:
//!
//! - an OS file lock on `<state_dir>/lock` (via `fs2`), shared by every
//!   process working on the same tree;
//! - an in-process flag, for stores that have no directory of their own.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use log::debug;
use thiserror::Error;

/// Name of the lock file inside the state directory.
pub const LOCK_FILE: &str = "lock";

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run already holds the lock.
    #[error("working tree is busy: another run holds the lock")]
    AlreadyLocked,

    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

#[derive(Debug)]
enum Backing {
    File { path: PathBuf, file: Option<File> },
    Flag(Option<Arc<AtomicBool>>),
}

/// Guard for an exclusive lock on one working tree.
#[derive(Debug)]
pub struct TreeLock {
    backing: Backing,
}

impl TreeLock {
    /// Take the file lock at `<state_dir>/lock`, creating the directory if
    /// needed.
    pub fn acquire(state_dir: &Path) -> Result<Self, LockError> {
        fs::create_dir_all(state_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", state_dir.display(), e))
        })?;

        let path = state_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired tree lock {}", path.display());
                Ok(Self {
                    backing: Backing::File {
                        path,
                        file: Some(file),
                    },
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LockError::AlreadyLocked)
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Take an in-process lock represented by `flag`.
    pub fn acquire_flag(flag: &Arc<AtomicBool>) -> Result<Self, LockError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LockError::AlreadyLocked)?;
        Ok(Self {
            backing: Backing::Flag(Some(Arc::clone(flag))),
        })
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        match &self.backing {
            Backing::File { file, .. } => file.is_some(),
            Backing::Flag(flag) => flag.is_some(),
        }
    }

    /// Path of the lock file, for file-backed locks.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File { path, .. } => Some(path),
            Backing::Flag(_) => None,
        }
    }

    /// Release the lock before the guard is dropped. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        match &mut self.backing {
            Backing::File { file, .. } => {
                if let Some(file) = file.take() {
                    file.unlock()
                        .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
                }
            }
            Backing::Flag(flag) => {
                if let Some(flag) = flag.take() {
                    flag.store(false, Ordering::Release);
                }
            }
        }
        Ok(())
    }
}

impl Drop for TreeLock {
    fn drop(&mut self) {
        // Best effort; nothing useful to do with an unlock error here.
        let _ = self.release();
    }
}
