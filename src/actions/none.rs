use std::path::PathBuf;

use super::{Action, ActionContext, ActionId};
use crate::error::ActionError;

/// Computes metadata and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComputeMetadata;

impl Action for ComputeMetadata {
    fn id(&self) -> ActionId {
        ActionId::None
    }

    fn description(&self) -> &'static str {
        "Read metadata without output (liveness check)"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        let path = ctx.path;
        let found = ctx.metadata()?.is_some();
        ctx.log.debug(&format!(
            "Computed metadata for {}: {}",
            path.display(),
            if found { "present" } else { "absent" }
        ));
        Ok(path.to_path_buf())
    }
}
