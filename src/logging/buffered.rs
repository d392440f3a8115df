//! Buffered logger for parallel transactions.
use std::sync::{Arc, Mutex};

use super::logger::Logger;
use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{FileStatus, Log};

/// A single buffered log entry, replayed when flushed.
#[derive(Debug, Clone)]
enum LogEntry {
    Stage(String),
    Info(String),
    Debug(String),
    Warn(String),
    Error(String),
    DryRun(String),
    Print(String),
}

impl LogEntry {
    /// Replay this entry to the console and log file via tracing.
    ///
    /// Must be called while holding the logger's `flush_lock`.
    fn replay(&self, logger: &Logger) {
        match self {
            Self::Stage(msg) => tracing::info!(target: STAGE_TARGET, "{msg}"),
            Self::Info(msg) => tracing::info!("{msg}"),
            Self::Debug(msg) => tracing::debug!("{msg}"),
            Self::Warn(msg) => tracing::warn!("{msg}"),
            Self::Error(msg) => tracing::error!("{msg}"),
            Self::DryRun(msg) => tracing::info!(target: DRY_RUN_TARGET, "{msg}"),
            Self::Print(text) => logger.print_unlocked(text),
        }
    }
}

/// Implement the display methods of [`Log`] by buffering each message into
/// `self.entries` as the corresponding [`LogEntry`] variant.
macro_rules! buffer_log_methods {
    ($($method:ident => $variant:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                if let Ok(mut guard) = self.entries.lock() {
                    guard.push(LogEntry::$variant(msg.to_string()));
                }
            }
        )+
    };
}

/// Buffered logger for one transaction in a parallel batch.
///
/// Captures display output in memory so that concurrent transactions do not
/// interleave their console output; entries are replayed in order by
/// [`flush_and_complete`](Self::flush_and_complete).
/// [`record_file`](Log::record_file) goes straight to the backing [`Logger`].
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    entries: Mutex<Vec<LogEntry>>,
}

impl BufferedLog {
    /// Create a new buffered logger backed by the given [`Logger`].
    #[must_use]
    pub const fn new(inner: Arc<Logger>) -> Self {
        Self {
            inner,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Flush all buffered entries and remove `file_name` from the active set.
    ///
    /// Holds the backing logger's flush lock so that transactions finishing
    /// at the same time print as contiguous blocks.
    pub fn flush_and_complete(&self, file_name: &str) {
        let _guard = self
            .inner
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.inner.clear_progress();
        let entries = match self.entries.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for entry in &entries {
            entry.replay(&self.inner);
        }
        let remaining = self.inner.active_files.lock().ok().and_then(|mut active| {
            active.retain(|n| n != file_name);
            (!active.is_empty()).then(|| active.join(", "))
        });
        if let Some(names) = remaining {
            self.inner.draw_progress(&names);
        }
    }
}

impl Log for BufferedLog {
    buffer_log_methods! {
        stage   => Stage,
        info    => Info,
        debug   => Debug,
        warn    => Warn,
        error   => Error,
        dry_run => DryRun,
        print   => Print,
    }

    fn record_file(&self, name: &str, status: FileStatus, message: Option<&str>) {
        self.inner.record_file(name, status, message);
    }
}
