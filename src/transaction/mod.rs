//! Per-file transactions.
//!
//! A [`Pipeline`] holds what every transaction of a run shares: the action
//! registry, the config resolver, the collaborators and the run options.
//! [`Pipeline::process`] drives one file through its state machine:
//!
//! ```text
//! Created → Resolving → Running(action)* → Committing → Done
//!                            └──────────→ Aborting → Failed
//! ```
//!
//! Actions work inside the [`StagingArea`]. The original file is only
//! touched by the commit, which moves it to a free backup name and installs
//! the final staged file in its place. A run where no action changes the
//! path writes nothing.

pub mod backup;
mod locks;
mod staging;

use std::fmt;
use std::path::{Path, PathBuf};

pub use backup::{MAX_BACKUP_ATTEMPTS, backup_candidate, free_backup_path};
pub use locks::{PathGuard, PathLocks};
pub use staging::StagingArea;

use crate::actions::{
    Action, ActionContext, ActionId, ActionRegistry, dotted_extension, effective_actions,
};
use crate::collaborators::Services;
use crate::config::ConfigResolver;
use crate::error::{ActionError, CommitError, EfmError, FileError};
use crate::logging::{FileStatus, Log};
use crate::metadata::MetadataState;
use crate::operations::FileSystemOps;

/// Options shared by every transaction of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Caller-requested actions; empty defers to config, then the default.
    pub actions: Vec<ActionId>,
    /// Log the commit instead of performing it.
    pub dry_run: bool,
    /// Keep staging directories after a successful transaction.
    pub keep_staging: bool,
}

/// Where a transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Constructed, nothing done yet.
    Created,
    /// Resolving the configuration and the action set.
    Resolving,
    /// Running an action.
    Running(ActionId),
    /// Backing up the original and installing the result.
    Committing,
    /// Finished, committed or unchanged.
    Done,
    /// An action or the commit failed.
    Aborting,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Resolving => f.write_str("resolving"),
            Self::Running(id) => write!(f, "running({id})"),
            Self::Committing => f.write_str("committing"),
            Self::Done => f.write_str("done"),
            Self::Aborting => f.write_str("aborting"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Audit record of a commit, real or dry-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// The input file.
    pub original: PathBuf,
    /// Where the result was (or would be) installed.
    pub installed: PathBuf,
    /// Where the original was (or would be) moved.
    pub backup: PathBuf,
    /// Actions that changed the file, in execution order.
    pub applied: Vec<ActionId>,
    /// Retained staging directory.
    pub staging: Option<PathBuf>,
}

impl CommitReport {
    fn applied_list(&self) -> String {
        self.applied
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One-line audit message.
    #[must_use]
    pub fn message(&self) -> String {
        let staging = self.staging.as_ref().map_or_else(String::new, |s| {
            format!(" Intermediate files are in {}.", s.display())
        });
        format!(
            "Successfully executed {} for {}.{staging} {} has been backed up to {}.",
            self.applied_list(),
            self.installed.display(),
            self.original.display(),
            self.backup.display()
        )
    }
}

/// How a successful transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// No action changed the file; nothing was written.
    NoChange,
    /// The result was installed and the original backed up.
    Committed(CommitReport),
    /// The commit was only logged.
    DryRun(CommitReport),
}

impl TransactionOutcome {
    /// Summary status for the run report.
    #[must_use]
    pub const fn status(&self) -> FileStatus {
        match self {
            Self::NoChange => FileStatus::Unchanged,
            Self::Committed(_) => FileStatus::Committed,
            Self::DryRun(_) => FileStatus::DryRun,
        }
    }

    /// Short detail for the run report.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::NoChange => None,
            Self::Committed(report) | Self::DryRun(report) => Some(format!(
                "{} → {}",
                report.applied_list(),
                report.installed.display()
            )),
        }
    }

    /// Paths the commit wrote, for watch-mode suppression.
    #[must_use]
    pub fn written_paths(&self) -> Vec<PathBuf> {
        match self {
            Self::Committed(report) => vec![report.installed.clone(), report.backup.clone()],
            Self::NoChange | Self::DryRun(_) => Vec::new(),
        }
    }
}

/// Everything transactions of one run share.
pub struct Pipeline {
    registry: ActionRegistry,
    resolver: ConfigResolver,
    services: Services,
    options: RunOptions,
    locks: PathLocks,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("resolver", &self.resolver)
            .field("services", &self.services)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with its own lock set.
    #[must_use]
    pub fn new(
        registry: ActionRegistry,
        resolver: ConfigResolver,
        services: Services,
        options: RunOptions,
    ) -> Self {
        Self {
            registry,
            resolver,
            services,
            options,
            locks: PathLocks::new(),
        }
    }

    /// The config resolver.
    #[must_use]
    pub const fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Run one transaction for `path`.
    ///
    /// Blocks while another transaction holds the same path.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] naming `path` (and the retained staging
    /// directory, if any) when config resolution, an action or the commit
    /// fails. The original file is unchanged in that case.
    pub fn process(&self, path: &Path, log: &dyn Log) -> Result<TransactionOutcome, FileError> {
        let _guard = self.locks.acquire(path);
        Transaction::new(path).perform(self, log)
    }
}

/// One file's trip through the action chain.
#[derive(Debug)]
struct Transaction {
    original: PathBuf,
    current: PathBuf,
    file_name: String,
    staging: StagingArea,
    applied: Vec<ActionId>,
    metadata: MetadataState,
    state: TransactionState,
}

impl Transaction {
    fn new(original: &Path) -> Self {
        let file_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original: original.to_path_buf(),
            current: original.to_path_buf(),
            staging: StagingArea::new(&file_name),
            file_name,
            applied: Vec::new(),
            metadata: MetadataState::Unknown,
            state: TransactionState::Created,
        }
    }

    fn transition(&mut self, next: TransactionState, log: &dyn Log) {
        log.debug(&format!(
            "{}: {} -> {next}",
            self.original.display(),
            self.state
        ));
        self.state = next;
    }

    fn perform(mut self, pipeline: &Pipeline, log: &dyn Log) -> Result<TransactionOutcome, FileError> {
        match self.run(pipeline, log) {
            Ok(outcome) => {
                self.transition(TransactionState::Done, log);
                if pipeline.options.keep_staging {
                    let _ = self.staging.retain();
                } else {
                    self.staging.cleanup();
                }
                Ok(outcome)
            }
            Err(source) => {
                self.transition(TransactionState::Aborting, log);
                let original = self.original.clone();
                self.transition(TransactionState::Failed, log);
                let staging = self.staging.retain();
                match &staging {
                    Some(dir) => log.error(&format!(
                        "Failed to complete all actions for {}. Intermediate files are in {}",
                        original.display(),
                        dir.display()
                    )),
                    None => log.error(&format!(
                        "Failed to complete all actions for {}.",
                        original.display()
                    )),
                }
                Err(FileError::new(original, source).with_staging(staging))
            }
        }
    }

    fn run(&mut self, pipeline: &Pipeline, log: &dyn Log) -> Result<TransactionOutcome, EfmError> {
        self.transition(TransactionState::Resolving, log);
        let directory = self
            .original
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config = pipeline.resolver.resolve(directory)?;
        if let Some(config) = &config {
            log.debug(&format!("Using config {}", config.path.display()));
        }
        let requested = effective_actions(
            &pipeline.options.actions,
            config.as_ref().map(|c| c.actions.as_slice()),
        );
        let plan = pipeline.registry.plan(&requested);
        log.debug(&format!(
            "Processing {} with actions {}",
            self.original.display(),
            plan.iter()
                .map(|a| a.id().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        for action in plan {
            let id = action.id();
            self.transition(TransactionState::Running(id), log);
            log.debug(&format!(
                "Performing action {id} on {}",
                self.current.display()
            ));
            let after = {
                let mut ctx = ActionContext {
                    config: config.as_ref(),
                    metadata: &mut self.metadata,
                    path: &self.current,
                    staging: &mut self.staging,
                    dry_run: pipeline.options.dry_run,
                    log,
                    services: &pipeline.services,
                };
                action.perform(&mut ctx)?
            };
            log.debug(&format!(
                "Action {id} succeeded and returned {}",
                after.display()
            ));
            if after != self.current {
                self.adopt(action, &after, pipeline.services.fs.as_ref(), log)?;
            }
        }

        if self.current == self.original {
            log.info(&format!(
                "Skipped all actions for {}.",
                self.original.display()
            ));
            return Ok(TransactionOutcome::NoChange);
        }
        self.transition(TransactionState::Committing, log);
        Ok(self.commit(pipeline, log)?)
    }

    /// Preserve the pre-action file as `before_<id><ext>` and make the
    /// action's output the current file, carrying a rename or extension
    /// change into the transaction's file name.
    ///
    /// On failure the current file is moved back, so `current` always names
    /// an existing file.
    fn adopt(
        &mut self,
        action: &dyn Action,
        after: &Path,
        fs: &dyn FileSystemOps,
        log: &dyn Log,
    ) -> Result<(), ActionError> {
        let id = action.id();
        let old_ext = dotted_extension(&self.current);
        let new_ext = dotted_extension(after);
        let staging = self.staging.dir()?.to_path_buf();

        let before = staging.join(format!("before_{id}{old_ext}"));
        let moved = self.current != self.original;
        if moved {
            log.debug(&format!(
                "Moving {} to {}",
                self.current.display(),
                before.display()
            ));
            fs.rename(&self.current, &before).map_err(|e| {
                ActionError::io(format!("moving {} within staging", self.current.display()), e)
            })?;
        } else {
            log.debug(&format!(
                "Copying {} to {}",
                self.current.display(),
                before.display()
            ));
            fs.copy(&self.current, &before).map_err(|e| {
                ActionError::io(format!("copying {} to staging", self.current.display()), e)
            })?;
        }

        let file_name = if action.renames() {
            after
                .file_name()
                .map_or_else(|| self.file_name.clone(), |n| n.to_string_lossy().into_owned())
        } else if new_ext != old_ext {
            let stem = Path::new(&self.file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{stem}{new_ext}")
        } else {
            self.file_name.clone()
        };

        let next = staging.join(&file_name);
        if after != next {
            log.debug(&format!("Moving {} to {}", after.display(), next.display()));
            if let Err(e) = fs.rename(after, &next) {
                if moved && let Err(restore) = fs.rename(&before, &self.current) {
                    log.warn(&format!(
                        "failed to move {} back to {}: {restore}",
                        before.display(),
                        self.current.display()
                    ));
                }
                return Err(ActionError::io(
                    format!("moving {} within staging", after.display()),
                    e,
                ));
            }
        }
        if file_name != self.file_name {
            log.debug(&format!("Renamed to {file_name}"));
        }
        self.file_name = file_name;
        self.current = next;
        self.applied.push(id);
        Ok(())
    }

    fn commit(&self, pipeline: &Pipeline, log: &dyn Log) -> Result<TransactionOutcome, CommitError> {
        let fs = pipeline.services.fs.as_ref();
        let directory = self.original.parent().unwrap_or_else(|| Path::new(""));
        let target = directory.join(&self.file_name);
        let _target_guard = if target == self.original {
            None
        } else {
            // Busy means another transaction holds it as its input or is
            // installing there: either way the name is taken.
            let guard = pipeline
                .locks
                .try_acquire(&target)
                .ok_or_else(|| CommitError::TargetExists(target.clone()))?;
            if fs.exists(&target) {
                return Err(CommitError::TargetExists(target));
            }
            Some(guard)
        };
        let backup = free_backup_path(&self.original, fs)?;
        let report = CommitReport {
            original: self.original.clone(),
            installed: target,
            backup,
            applied: self.applied.clone(),
            staging: if pipeline.options.keep_staging {
                self.staging.path().map(Path::to_path_buf)
            } else {
                None
            },
        };

        if pipeline.options.dry_run {
            log.dry_run(&format!(
                "would back up {} to {}",
                report.original.display(),
                report.backup.display()
            ));
            log.dry_run(&format!(
                "would install {} as {}",
                self.current.display(),
                report.installed.display()
            ));
            return Ok(TransactionOutcome::DryRun(report));
        }

        install(fs, &report, &self.current, log)?;
        log.info(&report.message());
        Ok(TransactionOutcome::Committed(report))
    }
}

/// Hidden sibling of `target` the result is copied to before the final rename.
fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.efm-partial"))
}

/// Move the original to its backup, then install `staged` at the target.
/// On an install failure the backup is moved back.
fn install(
    fs: &dyn FileSystemOps,
    report: &CommitReport,
    staged: &Path,
    log: &dyn Log,
) -> Result<(), CommitError> {
    log.debug(&format!(
        "Moving {} to {}",
        report.original.display(),
        report.backup.display()
    ));
    fs.rename(&report.original, &report.backup)
        .map_err(|source| CommitError::Io {
            context: format!("backing up {}", report.original.display()),
            source,
        })?;

    let partial = partial_path(&report.installed);
    log.debug(&format!(
        "Copying {} to {}",
        staged.display(),
        report.installed.display()
    ));
    let installed = fs
        .copy(staged, &partial)
        .and_then(|()| fs.rename(&partial, &report.installed));
    if let Err(source) = installed {
        if fs.exists(&partial)
            && let Err(e) = fs.remove_file(&partial)
        {
            log.warn(&format!("failed to remove {}: {e}", partial.display()));
        }
        if let Err(e) = fs.rename(&report.backup, &report.original) {
            log.error(&format!(
                "failed to restore {} from {}: {e}",
                report.original.display(),
                report.backup.display()
            ));
        }
        return Err(CommitError::Io {
            context: format!("installing {}", report.installed.display()),
            source,
        });
    }
    Ok(())
}
