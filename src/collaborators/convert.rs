//! Format conversion collaborator (KFX to EPUB).

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use crate::error::ActionError;
use crate::exec::Executor;

/// Converts a book to EPUB.
#[cfg_attr(test, mockall::automock)]
pub trait FormatConverter: Send + Sync {
    /// Convert `input` and return the EPUB bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Conversion`] if the input cannot be decoded.
    fn convert(&self, input: &Path) -> Result<Vec<u8>, ActionError>;
}

const PROGRAM: &str = "ebook-convert";

/// Runs calibre's `ebook-convert` into a private temporary directory.
#[derive(Debug, Clone)]
pub struct EbookConvert {
    executor: Arc<dyn Executor>,
}

impl EbookConvert {
    /// Create an adapter that runs through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl FormatConverter for EbookConvert {
    fn convert(&self, input: &Path) -> Result<Vec<u8>, ActionError> {
        if !self.executor.which(PROGRAM) {
            return Err(ActionError::Conversion(format!(
                "{PROGRAM} not found on PATH - install calibre with the KFX Input plugin"
            )));
        }
        let tmp = tempfile::Builder::new()
            .prefix("efm-convert-")
            .tempdir()
            .map_err(|e| ActionError::io("creating conversion directory", e))?;
        let output = tmp.path().join("converted.epub");
        self.executor
            .run(PROGRAM, &[input.as_os_str(), OsStr::new(&output)])
            .map_err(|e| ActionError::Conversion(format!("{e:#}")))?;
        std::fs::read(&output)
            .map_err(|e| ActionError::Conversion(format!("{PROGRAM} wrote no EPUB: {e}")))
    }
}
