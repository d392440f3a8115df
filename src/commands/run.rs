//! Command: run actions over files, folders and globs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};

use super::{inputs, watch};
use crate::actions::ActionRegistry;
use crate::cli::{GlobalOpts, RunOpts};
use crate::collaborators::Services;
use crate::config::ConfigResolver;
use crate::error::FileError;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{BufferedLog, FileStatus, Log, Logger};
use crate::shutdown::Shutdown;
use crate::transaction::{Pipeline, RunOptions, TransactionOutcome};

/// Something that turns one file into a transaction outcome.
///
/// A [`FileError`] inside the returned error is a per-file failure: it is
/// recorded and the batch continues. Any other error aborts the batch.
pub trait FileProcessor: Sync {
    /// Process `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] for typed per-file failures, anything else
    /// for defects that should stop the run.
    fn process(&self, path: &Path, log: &dyn Log) -> Result<TransactionOutcome>;
}

impl FileProcessor for Pipeline {
    fn process(&self, path: &Path, log: &dyn Log) -> Result<TransactionOutcome> {
        Ok(Self::process(self, path, log)?)
    }
}

/// Display name of `path` in logs and the summary.
fn display_name(path: &Path) -> String {
    path.display().to_string()
}

/// Failure detail for the summary: `Kind: cause`.
fn failure_detail(err: &FileError) -> String {
    let detail = format!("{}: {}", err.kind(), err.source);
    match &err.staging {
        Some(staging) => format!(
            "{detail} (intermediate files are in {})",
            staging.display()
        ),
        None => detail,
    }
}

/// Process one file, recording the result. Returns the paths the commit wrote.
fn process_one(processor: &dyn FileProcessor, path: &Path, log: &dyn Log) -> Result<Vec<PathBuf>> {
    let name = display_name(path);
    match processor.process(path, log) {
        Ok(outcome) => {
            log.record_file(&name, outcome.status(), outcome.detail().as_deref());
            Ok(outcome.written_paths())
        }
        Err(err) => match err.downcast::<FileError>() {
            Ok(file_err) => {
                log.record_file(&name, FileStatus::Failed, Some(&failure_detail(&file_err)));
                Ok(Vec::new())
            }
            Err(other) => Err(other.context(format!("processing {name}"))),
        },
    }
}

/// Run one transaction per file, in parallel when `parallel` is set.
///
/// Files not yet started when shutdown is requested are skipped.
///
/// # Errors
///
/// Returns the first untyped error; typed per-file failures are only
/// recorded on `log`.
pub fn process_batch(
    processor: &dyn FileProcessor,
    files: &[PathBuf],
    parallel: bool,
    log: &Arc<Logger>,
    shutdown: &Shutdown,
) -> Result<Vec<PathBuf>> {
    let run_file = |path: &PathBuf| -> Result<Vec<PathBuf>> {
        if shutdown.is_requested() {
            log.debug(&format!("shutdown requested, skipping {}", path.display()));
            return Ok(Vec::new());
        }
        if !parallel {
            return process_one(processor, path, log.as_ref());
        }
        let name = display_name(path);
        log.notify_file_start(&name);
        let buf = BufferedLog::new(Arc::clone(log));
        let result = process_one(processor, path, &buf);
        buf.flush_and_complete(&name);
        result
    };

    let written: Vec<Vec<PathBuf>> = if parallel && files.len() > 1 {
        use rayon::prelude::*;
        files.par_iter().map(run_file).collect::<Result<_>>()?
    } else {
        files.iter().map(run_file).collect::<Result<_>>()?
    };
    if shutdown.is_requested() {
        log.warn("interrupted, remaining files were skipped");
    }
    Ok(written.into_iter().flatten().collect())
}

/// Run the `run` command.
///
/// # Errors
///
/// Returns an error if input expansion or watching fails, if an untyped
/// error aborts the batch, or if any file failed.
pub fn run(global: &GlobalOpts, opts: &RunOpts, log: &Arc<Logger>, shutdown: &Shutdown) -> Result<()> {
    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor::new(shutdown.clone()));
    let options = RunOptions {
        actions: opts.actions.clone(),
        dry_run: global.dry_run,
        keep_staging: opts.keep_staging,
    };
    let pipeline = Pipeline::new(
        ActionRegistry::new(),
        ConfigResolver::default(),
        Services::system(&executor),
        options,
    );

    log.stage("Collecting files");
    let files = inputs::expand(&opts.paths, pipeline.resolver(), log.as_ref())?;
    log.info(&format!("{} files to process", files.len()));
    if global.dry_run {
        log.info("dry run: originals will not be modified");
    }

    log.stage("Processing");
    let outcome =
        process_batch(&pipeline, &files, global.parallel, log, shutdown).and_then(|written| {
            if opts.watch {
                watch::run(&pipeline, &opts.paths, &written, global.parallel, log, shutdown)
            } else {
                Ok(())
            }
        });
    finish(log, outcome)
}

/// Print the summary of every recorded file, then report the run's result.
///
/// The summary is printed even when `outcome` is an abort, so failures
/// recorded before it are still shown.
fn finish(log: &Logger, outcome: Result<()>) -> Result<()> {
    log.print_summary();
    outcome?;
    let failed = log.failure_count();
    if failed > 0 {
        bail!("{failed} file(s) failed");
    }
    Ok(())
}
