//! Structured logger with dry-run awareness and summary collection.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{FileEntry, FileStatus, Log};
use super::utils::{log_file_path, terminal_columns};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and per-file summary collection.
///
/// All messages also reach the persistent log file at
/// `$XDG_CACHE_HOME/efm/<command>.log` through the subscriber's file layer.
#[derive(Debug)]
pub struct Logger {
    files: Mutex<Vec<FileEntry>>,
    log_file: Option<PathBuf>,
    /// Serializes console output from parallel transaction flushes.
    pub(super) flush_lock: Mutex<()>,
    /// Files whose transactions are currently running.
    pub(super) active_files: Mutex<Vec<String>>,
    /// Whether a progress line is currently displayed.
    pub(super) progress_shown: Mutex<bool>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the summary; the file itself
    /// is created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
            flush_lock: Mutex::new(()),
            active_files: Mutex::new(Vec::new()),
            progress_shown: Mutex::new(false),
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded file entries.
    #[must_use]
    pub fn file_entries(&self) -> Vec<FileEntry> {
        self.files.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a mutation skipped by dry-run mode.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Write report text to stdout, regardless of the console level.
    ///
    /// Also recorded in the log file at debug level.
    #[allow(clippy::print_stdout)]
    pub fn print(&self, text: &str) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.clear_progress();
        self.print_unlocked(text);
    }

    /// [`print`](Self::print) for callers already holding `flush_lock`.
    #[allow(clippy::print_stdout)]
    pub(super) fn print_unlocked(&self, text: &str) {
        println!("{text}");
        tracing::debug!("{text}");
    }

    /// Record a file result for the summary.
    pub fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.files.lock() {
            guard.push(FileEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed files.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.files.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|t| t.status == FileStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded files.
    ///
    /// Failures are listed last so the aggregate error report sits at the
    /// bottom of the output.
    pub fn print_summary(&self) {
        let mut files = self.file_entries();
        if files.is_empty() {
            return;
        }
        files.sort_by_key(|f| f.status == FileStatus::Failed);

        self.stage("Summary");

        let mut committed = 0u32;
        let mut unchanged = 0u32;
        let mut dry_run = 0u32;
        let mut failed = 0u32;

        for file in &files {
            let (icon, color) = match file.status {
                FileStatus::Committed => {
                    committed += 1;
                    ("✓", "\x1b[32m")
                }
                FileStatus::Unchanged => {
                    unchanged += 1;
                    ("·", "\x1b[2m")
                }
                FileStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                FileStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = file
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            if file.status == FileStatus::Failed {
                self.error(&format!("{color}{icon} {}{suffix}\x1b[0m", file.name));
            } else {
                self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", file.name));
            }
        }

        let total = committed + unchanged + dry_run + failed;
        self.info(&format!(
            "{total} files: \x1b[32m{committed} committed\x1b[0m, \x1b[2m{unchanged} unchanged\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Erase the in-progress status line. Must be called while holding `flush_lock`.
    #[allow(clippy::print_stdout)]
    pub(super) fn clear_progress(&self) {
        let mut shown = self
            .progress_shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *shown {
            print!("\r\x1b[K");
            std::io::stdout().flush().ok();
            *shown = false;
        }
    }

    /// Print the in-progress status line, truncated to one terminal row.
    ///
    /// Must be called while holding `flush_lock`.
    #[allow(clippy::print_stdout)]
    pub(super) fn draw_progress(&self, names: &str) {
        let max_name_chars = terminal_columns().saturating_sub(4);
        let display_names = if names.chars().count() > max_name_chars {
            let truncated: String = names
                .chars()
                .take(max_name_chars.saturating_sub(1))
                .collect();
            format!("{truncated}…")
        } else {
            names.to_string()
        };
        print!("  \x1b[2m▹ {display_names}\x1b[0m");
        std::io::stdout().flush().ok();
        *self
            .progress_shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = true;
    }

    /// Record that a parallel transaction has started and redraw the status line.
    pub fn notify_file_start(&self, name: &str) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.clear_progress();
        let names = self.active_files.lock().map_or_else(
            |_| name.to_string(),
            |mut active| {
                active.push(name.to_string());
                active.join(", ")
            },
        );
        self.draw_progress(&names);
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run, print);

    fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>) {
        self.record_file(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.file_entries().is_empty(), "expected empty file list");
    }

    #[test]
    fn record_file_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_file("/b/a.pdf", FileStatus::Committed, Some("backup /b/a.pdf.bak"));
        let files = log.file_entries();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "/b/a.pdf");
        assert_eq!(files[0].message.as_deref(), Some("backup /b/a.pdf.bak"));
    }

    #[test]
    fn failure_count_returns_correct_count() {
        let (log, _tmp, _guard) = isolated_logger();
        assert_eq!(log.failure_count(), 0);
        log.record_file("a", FileStatus::Committed, None);
        log.record_file("b", FileStatus::Failed, Some("ConfigError: bad"));
        log.record_file("c", FileStatus::Failed, Some("FetchFailure: no user"));
        log.record_file("d", FileStatus::Unchanged, None);
        assert_eq!(log.failure_count(), 2);
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_file("via-trait", FileStatus::DryRun, None);
        assert_eq!(log.file_entries().len(), 1);
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[debug]"));
        assert!(contents.contains(&marker));
    }

    #[test]
    fn stage_written_to_file_with_arrow() {
        let (log, _tmp, _guard) = isolated_logger();
        log.stage("Processing books");
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("==> Processing books"));
    }

    #[test]
    fn dry_run_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("dryrun-marker-{}", std::process::id());
        log.dry_run(&marker);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[dry run]"));
        assert!(contents.contains(&marker));
    }

    #[test]
    fn summary_lists_failures_with_kind() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_file(
            "/b/novel.azw3",
            FileStatus::Failed,
            Some("MissingKeyMaterialError: Missing required key for Kindle"),
        );
        log.record_file("/b/ok.epub", FileStatus::Unchanged, None);
        log.print_summary();
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[error]"));
        assert!(contents.contains("/b/novel.azw3 (MissingKeyMaterialError"));
        assert!(contents.contains("2 files:"));
        let ok_pos = contents.find("/b/ok.epub").expect("ok entry");
        let fail_pos = contents.find("/b/novel.azw3").expect("failed entry");
        assert!(ok_pos < fail_pos, "failures are listed last");
    }

    #[test]
    #[allow(clippy::significant_drop_tightening)]
    fn notify_file_start_tracks_active_files() {
        let (log, _tmp, _guard) = isolated_logger();
        log.notify_file_start("a.pdf");
        assert!(*log.progress_shown.lock().unwrap());
        let active = log.active_files.lock().unwrap();
        assert!(active.contains(&"a.pdf".to_string()));
    }
}
