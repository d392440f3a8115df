//! Filesystem operation abstractions for dependency injection.
//!
//! The transaction moves files between the staging area and the original
//! file's directory exclusively through [`FileSystemOps`], so unit tests can
//! observe every write and inject failures. Only the commit step writes to
//! the original's directory. Production code uses [`SystemFileSystemOps`];
//! tests use `MockFileSystemOps`.

use std::io;
use std::path::Path;

/// Abstraction over the filesystem mutations performed at commit time.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists (without following a dangling symlink).
    fn exists(&self, path: &Path) -> bool;

    /// Rename `from` to `to` within one filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy the contents of `from` into a new file at `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading `from` or writing `to` fails.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::copy(from, to).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Recording [`FileSystemOps`] for unit tests.
///
/// Delegates to the real filesystem (tests run against a temp dir) while
/// recording every mutating call. Use [`fail_copy_into`](Self::fail_copy_into)
/// to make the install step fail after the original has been moved to its
/// backup.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    writes: std::sync::Mutex<Vec<String>>,
    fail_copy_into: Option<std::path::PathBuf>,
    fail_rename_named: Option<std::ffi::OsString>,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create a mock that records calls and never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every [`FileSystemOps::copy`] into `dir` fail.
    #[must_use]
    pub fn fail_copy_into(mut self, dir: &Path) -> Self {
        self.fail_copy_into = Some(dir.to_path_buf());
        self
    }

    /// Make every [`FileSystemOps::rename`] of a file called `name` fail.
    #[must_use]
    pub fn fail_rename_named(mut self, name: &str) -> Self {
        self.fail_rename_named = Some(name.into());
        self
    }

    /// Return a description of every mutating call made so far.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    fn record(&self, op: &str, path: &Path) {
        if let Ok(mut guard) = self.writes.lock() {
            guard.push(format!("{op} {}", path.display()));
        }
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("rename", from);
        if self
            .fail_rename_named
            .as_deref()
            .is_some_and(|name| from.file_name() == Some(name))
        {
            return Err(io::Error::other("mock: rename refused"));
        }
        SystemFileSystemOps.rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("copy", to);
        if self
            .fail_copy_into
            .as_deref()
            .is_some_and(|dir| to.parent() == Some(dir))
        {
            return Err(io::Error::other("mock: copy refused"));
        }
        SystemFileSystemOps.copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.record("remove", path);
        SystemFileSystemOps.remove_file(path)
    }
}
