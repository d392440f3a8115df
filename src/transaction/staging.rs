//! Per-transaction staging directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::ActionError;

/// Temporary directory holding one transaction's intermediate files.
///
/// Created on first use under the system temp dir with the prefix
/// `efm-<filename>-`. Dropping the area deletes the directory; call
/// [`retain`](Self::retain) to keep it.
#[derive(Debug)]
pub struct StagingArea {
    prefix: String,
    dir: Option<TempDir>,
}

impl StagingArea {
    /// Staging area for the file named `file_name`. Nothing is created yet.
    #[must_use]
    pub fn new(file_name: &str) -> Self {
        Self {
            prefix: format!("efm-{file_name}-"),
            dir: None,
        }
    }

    /// The staging directory, creating it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Io`] if the directory cannot be created.
    pub fn dir(&mut self) -> Result<&Path, ActionError> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(&self.prefix)
                    .tempdir()
                    .map_err(|e| ActionError::io("creating staging directory", e))?;
                tracing::debug!("created staging directory {}", dir.path().display());
                dir
            }
        };
        Ok(self.dir.insert(dir).path())
    }

    /// The directory, if it has been created.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Keep the directory on disk and return its path.
    #[must_use]
    pub fn retain(self) -> Option<PathBuf> {
        self.dir.map(TempDir::keep)
    }

    /// Delete the directory now, logging instead of failing.
    pub fn cleanup(self) {
        if let Some(dir) = self.dir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("failed to remove staging directory {}: {e}", path.display());
            }
        }
    }
}
