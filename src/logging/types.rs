//! Core logging types: per-file entries, status, and the [`Log`] trait.

/// Transaction result for summary reporting.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path of the input file, as displayed.
    pub name: String,
    /// Final status of the transaction.
    pub status: FileStatus,
    /// Optional detail (audit trail for commits, error kind and message for failures).
    pub message: Option<String>,
}

/// Final status of one file's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Staged result was installed and the original backed up.
    Committed,
    /// Every action was a no-op; nothing was written.
    Unchanged,
    /// Transaction ran in dry-run mode; commit was only logged.
    DryRun,
    /// An action or the commit failed; the original is untouched.
    Failed,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// parallel transactions) implement this trait, so actions and the
/// transaction log without knowing whether output is immediate or buffered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a filesystem mutation that dry-run mode skipped.
    fn dry_run(&self, msg: &str);
    /// Write report text (e.g. printed metadata) to stdout regardless of
    /// the console log level.
    fn print(&self, text: &str);
    /// Record a file result for the summary.
    fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>);
}
