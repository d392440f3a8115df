//! Page reformatting collaborator (`k2pdfopt`).

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use crate::error::ActionError;
use crate::exec::Executor;

/// Reformats a PDF for small screens.
#[cfg_attr(test, mockall::automock)]
pub trait Reformatter: Send + Sync {
    /// Write a reformatted copy of `input` to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Reformat`] if the tool is missing, exits
    /// non-zero or writes nothing.
    fn reformat(&self, input: &Path, output: &Path) -> Result<(), ActionError>;
}

const PROGRAM: &str = "k2pdfopt";

/// Output margin, document scale and target screen size.
const FLAGS: [&str; 8] = ["-om", "0.1", "-ds", "0.5", "-w", "1264", "-h", "1680"];

/// Runs `k2pdfopt` with fixed margin, scale and screen size.
#[derive(Debug, Clone)]
pub struct K2pdfopt {
    executor: Arc<dyn Executor>,
}

impl K2pdfopt {
    /// Create an adapter that runs through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl Reformatter for K2pdfopt {
    fn reformat(&self, input: &Path, output: &Path) -> Result<(), ActionError> {
        if !self.executor.which(PROGRAM) {
            return Err(ActionError::Reformat(format!(
                "{PROGRAM} not found on PATH - install it from https://www.willus.com/k2pdfopt/"
            )));
        }
        let mut args: Vec<&OsStr> = FLAGS.iter().copied().map(OsStr::new).collect();
        args.extend([OsStr::new("-o"), output.as_os_str(), input.as_os_str()]);
        let result = self
            .executor
            .run_unchecked(PROGRAM, &args)
            .map_err(|e| ActionError::Reformat(format!("{e:#}")))?;
        if !result.success {
            return Err(ActionError::Reformat(format!(
                "{PROGRAM} exited with {}: {}",
                result
                    .code
                    .map_or_else(|| "a signal".to_string(), |c| format!("status {c}")),
                result.stderr.trim()
            )));
        }
        if !output.exists() {
            return Err(ActionError::Reformat(format!(
                "{PROGRAM} reported success but wrote no output"
            )));
        }
        Ok(())
    }
}
