//! Backup naming for committed originals.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::CommitError;
use crate::operations::FileSystemOps;

/// Candidates probed before giving up.
pub const MAX_BACKUP_ATTEMPTS: usize = 1000;

/// The `n`th backup candidate for `original`: `<orig>.bak`, then
/// `<orig>.1.bak`, `<orig>.2.bak`, ...
#[must_use]
pub fn backup_candidate(original: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(original.as_os_str());
    if n == 0 {
        name.push(".bak");
    } else {
        name.push(format!(".{n}.bak"));
    }
    PathBuf::from(name)
}

/// First backup candidate that does not exist yet.
///
/// # Errors
///
/// Returns [`CommitError::BackupCollision`] when all
/// [`MAX_BACKUP_ATTEMPTS`] candidates are taken.
pub fn free_backup_path(original: &Path, fs: &dyn FileSystemOps) -> Result<PathBuf, CommitError> {
    (0..MAX_BACKUP_ATTEMPTS)
        .map(|n| backup_candidate(original, n))
        .find(|candidate| !fs.exists(candidate))
        .ok_or_else(|| CommitError::BackupCollision {
            path: original.to_path_buf(),
            attempts: MAX_BACKUP_ATTEMPTS,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::SystemFileSystemOps;

    #[test]
    fn candidates_follow_numbering() {
        let original = Path::new("/b/book.epub");
        assert_eq!(backup_candidate(original, 0), Path::new("/b/book.epub.bak"));
        assert_eq!(backup_candidate(original, 1), Path::new("/b/book.epub.1.bak"));
        assert_eq!(backup_candidate(original, 12), Path::new("/b/book.epub.12.bak"));
    }

    #[test]
    fn skips_existing_backups() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("book.epub");
        std::fs::write(dir.path().join("book.epub.bak"), "").unwrap();
        std::fs::write(dir.path().join("book.epub.1.bak"), "").unwrap();
        let free = free_backup_path(&original, &SystemFileSystemOps).unwrap();
        assert_eq!(free, dir.path().join("book.epub.2.bak"));
    }

    #[test]
    fn gives_up_after_limit() {
        #[derive(Debug)]
        struct Full;
        impl FileSystemOps for Full {
            fn exists(&self, _: &Path) -> bool {
                true
            }
            fn rename(&self, _: &Path, _: &Path) -> std::io::Result<()> {
                Ok(())
            }
            fn copy(&self, _: &Path, _: &Path) -> std::io::Result<()> {
                Ok(())
            }
            fn remove_file(&self, _: &Path) -> std::io::Result<()> {
                Ok(())
            }
        }
        let err = free_backup_path(Path::new("/b/x.pdf"), &Full).unwrap_err();
        assert!(matches!(
            err,
            CommitError::BackupCollision { attempts: MAX_BACKUP_ATTEMPTS, .. }
        ));
    }
}
