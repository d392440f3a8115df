use std::path::{Path, PathBuf};

use super::{Action, ActionContext, ActionId, dotted_extension};
use crate::error::ActionError;
use crate::metadata::Metadata;

/// Renames a book to `Author - Title.ext`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameBook;

/// Characters that cannot appear in a file name component.
const FORBIDDEN: [char; 3] = ['/', '\\', '\0'];

/// Canonical file name for `metadata`, keeping the extension of `path`.
///
/// Returns `None` when the metadata has no title.
#[must_use]
pub fn canonical_name(metadata: &Metadata, path: &Path) -> Option<String> {
    let title = metadata.title.as_deref()?;
    let author = metadata.author.as_deref().unwrap_or("unknown");
    let name = format!("{author} - {title}{}", dotted_extension(path));
    Some(name.replace(FORBIDDEN, "_"))
}

impl Action for RenameBook {
    fn id(&self) -> ActionId {
        ActionId::Rename
    }

    fn description(&self) -> &'static str {
        "Rename to \"Author - Title.ext\" using the book's metadata"
    }

    fn renames(&self) -> bool {
        true
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        let path = ctx.path;
        let Some(metadata) = ctx.metadata()? else {
            return Err(ActionError::Metadata("Cannot rename".to_string()));
        };
        let Some(new_name) = canonical_name(metadata, path) else {
            ctx.log.warn(&format!(
                "Skipping rename of {} because it has no title.",
                path.display()
            ));
            return Ok(path.to_path_buf());
        };
        if path.file_name().is_some_and(|n| n.to_string_lossy() == new_name) {
            ctx.log.debug(&format!(
                "Skipping {} because it's already named correctly.",
                path.display()
            ));
            return Ok(path.to_path_buf());
        }
        let target = ctx.staging_dir()?.join(&new_name);
        std::fs::copy(path, &target)
            .map_err(|e| ActionError::io(format!("copying {} to staging", path.display()), e))?;
        ctx.log
            .info(&format!("Renamed {} to {new_name}", path.display()));
        Ok(target)
    }
}
