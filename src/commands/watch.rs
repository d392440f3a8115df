//! Watch mode: process files as they appear under the inputs.
//!
//! Filesystem events are debounced per path so a file still being written
//! is processed once, after it has been quiet for [`QUIET_PERIOD`]. Paths a
//! commit just wrote are suppressed for [`SUPPRESS_WINDOW`] so installed
//! results are not picked up again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};

use super::inputs::{InputSpec, is_candidate};
use super::run::process_batch;
use crate::config::ConfigResolver;
use crate::logging::Logger;
use crate::shutdown::Shutdown;
use crate::transaction::Pipeline;

/// How long a path must be quiet before it is processed.
pub const QUIET_PERIOD: Duration = Duration::from_secs(1);

/// How long events for freshly committed paths are ignored.
pub const SUPPRESS_WINDOW: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Collects paths and releases each once it has been quiet long enough.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    /// Debouncer releasing paths after `quiet` without activity.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    /// Note activity on `path` at `now`, restarting its quiet period.
    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return every path quiet since `now - quiet`, sorted.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let quiet = self.quiet;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= quiet)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Paths whose events are ignored until a deadline.
#[derive(Debug)]
pub struct Suppressor {
    window: Duration,
    until: HashMap<PathBuf, Instant>,
}

impl Suppressor {
    /// Suppressor ignoring paths for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            until: HashMap::new(),
        }
    }

    /// Ignore `paths` for the suppression window starting at `now`.
    pub fn suppress<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>, now: Instant) {
        for path in paths {
            self.until.insert(path.clone(), now + self.window);
        }
    }

    /// Whether events for `path` are currently ignored. Drops expired entries.
    pub fn is_suppressed(&mut self, path: &Path, now: Instant) -> bool {
        self.until.retain(|_, deadline| *deadline > now);
        self.until.contains_key(path)
    }
}

/// Decides which event paths belong to the watched inputs.
#[derive(Debug)]
pub struct WatchFilter<'a> {
    specs: Vec<InputSpec>,
    resolver: &'a ConfigResolver,
}

impl<'a> WatchFilter<'a> {
    /// Filter for the command-line inputs `specs`.
    ///
    /// # Errors
    ///
    /// Returns an error if an input is not a valid glob pattern.
    pub fn new(specs: &[String], resolver: &'a ConfigResolver) -> Result<Self> {
        let specs = specs
            .iter()
            .map(|s| InputSpec::parse(s))
            .collect::<Result<_>>()?;
        Ok(Self { specs, resolver })
    }

    /// Directories to watch, deduplicated.
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.specs.iter().map(InputSpec::watch_root).collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// Whether a file at `path` should be processed.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        is_candidate(path, self.resolver) && self.specs.iter().any(|s| s.matches(path))
    }
}

const fn is_content_event(kind: EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Watch the inputs and process new or changed files until shutdown.
///
/// `already_written` holds the paths the initial batch committed.
///
/// # Errors
///
/// Returns an error if the watcher cannot be started or an untyped error
/// aborts a batch.
pub fn run(
    pipeline: &Pipeline,
    specs: &[String],
    already_written: &[PathBuf],
    parallel: bool,
    log: &Arc<Logger>,
    shutdown: &Shutdown,
) -> Result<()> {
    let filter = WatchFilter::new(specs, pipeline.resolver())?;
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // The receiver only goes away when watching stops.
        let _ = tx.send(res);
    })
    .context("failed to start filesystem watcher")?;
    for root in filter.roots() {
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;
        log.info(&format!("watching {}", root.display()));
    }

    let mut debouncer = Debouncer::new(QUIET_PERIOD);
    let mut suppressor = Suppressor::new(SUPPRESS_WINDOW);
    suppressor.suppress(already_written, Instant::now());
    log.stage("Watching for changes (Ctrl-C to stop)");

    while !shutdown.is_requested() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) if is_content_event(event.kind) => {
                let now = Instant::now();
                for path in event.paths {
                    if path.is_file()
                        && filter.accepts(&path)
                        && !suppressor.is_suppressed(&path, now)
                    {
                        log.debug(&format!("change detected: {}", path.display()));
                        debouncer.touch(path, now);
                    }
                }
            }
            Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Err(e)) => log.warn(&format!("watch error: {e}")),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if debouncer.is_empty() {
            continue;
        }
        let ready: Vec<PathBuf> = debouncer
            .drain_ready(Instant::now())
            .into_iter()
            .filter(|p| p.is_file())
            .collect();
        if ready.is_empty() {
            continue;
        }
        log.stage(&format!("Processing {} changed file(s)", ready.len()));
        let written = process_batch(pipeline, &ready, parallel, log, shutdown)?;
        suppressor.suppress(&written, Instant::now());
    }

    log.info("stopped watching");
    Ok(())
}
