use std::path::Path;

use crate::collaborators::Services;
use crate::config::Config;
use crate::error::ActionError;
use crate::logging::Log;
use crate::metadata::{Metadata, MetadataState};
use crate::transaction::StagingArea;

/// What an action sees of its transaction.
pub struct ActionContext<'a> {
    /// Effective configuration, if any file applies.
    pub config: Option<&'a Config>,
    /// Metadata shared by every action of the transaction.
    pub metadata: &'a mut MetadataState,
    /// The file being acted upon: the original or a staged intermediate.
    pub path: &'a Path,
    /// Where actions write their output.
    pub staging: &'a mut StagingArea,
    /// Whether mutations outside the staging area are only logged.
    pub dry_run: bool,
    /// Transaction log.
    pub log: &'a dyn Log,
    /// External collaborators.
    pub services: &'a Services,
}

impl std::fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("config", &self.config.map(|c| &c.path))
            .field("metadata", &self.metadata)
            .field("path", &self.path)
            .field("staging", &self.staging)
            .field("dry_run", &self.dry_run)
            .field("log", &"<dyn Log>")
            .field("services", &self.services)
            .finish()
    }
}

impl ActionContext<'_> {
    /// The transaction's metadata, read on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Metadata`] if the reader fails.
    pub fn metadata(&mut self) -> Result<Option<&mut Metadata>, ActionError> {
        self.metadata
            .resolve(self.services.metadata.as_ref(), self.path)
    }

    /// The staging directory, created on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Io`] if it cannot be created.
    pub fn staging_dir(&mut self) -> Result<&Path, ActionError> {
        self.staging.dir()
    }
}
