//! Named inter-process lock around shared working trees.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::LockError;

/// Exclusive advisory lock on `{dir}/.roadrunners-{name}.lock`, held until
/// dropped.
#[derive(Debug)]
pub struct NamedLock {
    _file: File,
    path: PathBuf,
}

impl NamedLock {
    pub fn lock_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!(".roadrunners-{name}.lock"))
    }

    /// Block until the lock is ours. Waiting happens on the blocking pool.
    pub async fn acquire(dir: &Path, name: &str) -> Result<Self, LockError> {
        let path = Self::lock_path(dir, name);
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(task_path))
            .await
            .map_err(|e| LockError {
                path,
                source: std::io::Error::other(e),
            })?
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(dir: &Path, name: &str) -> Result<Option<Self>, LockError> {
        let path = Self::lock_path(dir, name);
        let file = open_lock_file(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }
        Ok(Some(Self { _file: file, path }))
    }

    fn acquire_blocking(path: PathBuf) -> Result<Self, LockError> {
        let file = open_lock_file(&path)?;
        if file.try_lock_exclusive().is_err() {
            info!(lock = %path.display(), "Waiting for lock held by another build");
            file.lock_exclusive().map_err(|source| LockError {
                path: path.clone(),
                source,
            })?;
        }
        debug!(lock = %path.display(), "Lock acquired");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    // Stale lock files are never unlinked: a waiter may hold the old inode.
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError {
            path: path.to_path_buf(),
            source,
        })
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        debug!(lock = %self.path.display(), "Lock released");
    }
}
