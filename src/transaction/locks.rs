//! Per-path single-flight guard.
//!
//! Backup probing is not safe when two transactions commit the same original
//! at once. Every transaction holds a [`PathGuard`] for its input while it
//! runs; a second transaction for the same path blocks until the first ends.
//! A commit also holds its target from the existence check until the result
//! is installed, so two books renamed to the same name cannot both pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};

/// Set of paths with a transaction in flight.
#[derive(Debug, Default)]
pub struct PathLocks {
    busy: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Holds one path in a [`PathLocks`] until dropped.
#[derive(Debug)]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: PathBuf,
}

/// Lock key for `path`: canonical when it exists, its file name under the
/// canonical parent when only the parent exists, as given otherwise.
fn key(path: &Path) -> PathBuf {
    dunce::canonicalize(path)
        .or_else(|e| match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => dunce::canonicalize(parent).map(|p| p.join(name)),
            _ => Err(e),
        })
        .unwrap_or_else(|_| path.to_path_buf())
}

impl PathLocks {
    /// Empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `path` is free, then hold it.
    pub fn acquire(&self, path: &Path) -> PathGuard<'_> {
        let path = key(path);
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while busy.contains(&path) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(path.clone());
        PathGuard { locks: self, path }
    }

    /// Hold `path` if it is free, without blocking.
    pub fn try_acquire(&self, path: &Path) -> Option<PathGuard<'_>> {
        let path = key(path);
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        busy.insert(path.clone())
            .then(|| PathGuard { locks: self, path })
    }

    /// Whether a transaction currently holds `path`.
    #[must_use]
    pub fn is_busy(&self, path: &Path) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key(path))
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
        self.locks.released.notify_all();
    }
}
