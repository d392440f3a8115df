//! Pipeline actions.
//!
//! Every action implements [`Action`]. An action reads the current file,
//! writes any output into the staging directory and returns the path that
//! now represents the book. Returning the input path means "no change".
//! The [`ActionRegistry`] runs the requested subset in canonical order.

mod context;
pub mod drm;
pub mod fetch;
mod id;
pub mod kfx2epub;
pub mod none;
pub mod pdf;
pub mod print;
mod registry;
pub mod rename;

use std::path::{Path, PathBuf};

pub use context::ActionContext;
pub use id::{ActionId, UnknownActionId};
pub use registry::{ActionRegistry, effective_actions};

use crate::error::ActionError;

/// One step of a transaction.
pub trait Action: Send + Sync {
    /// Stable identifier.
    fn id(&self) -> ActionId;

    /// One-line description for help output.
    fn description(&self) -> &'static str;

    /// Whether the output's file name replaces the transaction's file name.
    ///
    /// Other actions only carry an extension change forward.
    fn renames(&self) -> bool {
        false
    }

    /// Run the action on `ctx.path`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the step cannot complete. The
    /// transaction aborts and the original file is left untouched.
    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError>;
}

/// Extension of `path` including the dot, or an empty string.
pub(crate) fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()))
}
