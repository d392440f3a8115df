use std::path::PathBuf;

use super::{Action, ActionContext, ActionId};
use crate::error::ActionError;
use crate::formats::BookFormat;

/// Converts KFX books to EPUB.
#[derive(Debug, Default, Clone, Copy)]
pub struct KfxToEpub;

impl Action for KfxToEpub {
    fn id(&self) -> ActionId {
        ActionId::Kfx2Epub
    }

    fn description(&self) -> &'static str {
        "Convert KFX / KFX-ZIP books to EPUB"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        if BookFormat::from_path(ctx.path) != BookFormat::Kfx {
            ctx.log
                .debug(&format!("Skipping {} because it's not a KFX file.", ctx.path.display()));
            return Ok(ctx.path.to_path_buf());
        }
        let bytes = ctx.services.converter.convert(ctx.path)?;
        let stem = ctx
            .path
            .file_stem()
            .map_or_else(|| "converted".into(), |s| s.to_string_lossy());
        let output = ctx.staging_dir()?.join(format!("{stem}.epub"));
        std::fs::write(&output, bytes)
            .map_err(|e| ActionError::io(format!("writing {}", output.display()), e))?;
        ctx.log.info(&format!("Converted {} to EPUB", ctx.path.display()));
        Ok(output)
    }
}
