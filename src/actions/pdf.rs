use std::path::PathBuf;

use super::{Action, ActionContext, ActionId};
use crate::error::ActionError;
use crate::formats::marker::embed_marker;

/// Reformats PDFs for small screens with `k2pdfopt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReformatPdf;

impl Action for ReformatPdf {
    fn id(&self) -> ActionId {
        ActionId::Pdf
    }

    fn description(&self) -> &'static str {
        "Reformat PDFs for e-reader screens with k2pdfopt"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        let path = ctx.path;
        let Some(metadata) = ctx.metadata()? else {
            return Err(ActionError::Metadata("Cannot reformat".to_string()));
        };
        if metadata.is_reformatted_version {
            ctx.log.debug(&format!(
                "Skipping {} because it's already reformatted.",
                path.display()
            ));
            return Ok(path.to_path_buf());
        }
        if !metadata.is_pdf() {
            let format = metadata.format.clone().unwrap_or_default();
            ctx.log.debug(&format!(
                "Skipping {} because it's not a PDF. Format is {format}.",
                path.display()
            ));
            return Ok(path.to_path_buf());
        }

        let staging = ctx.staging_dir()?.to_path_buf();
        let reformatted = staging.join("post_reformat_pdf_k2pdfopt.pdf");
        ctx.services.reformatter.reformat(path, &reformatted)?;
        ctx.log.debug(&format!(
            "Reformatted {} with k2pdfopt to {}",
            path.display(),
            reformatted.display()
        ));

        let marked = staging.join("post_reformat_pdf_metadata.pdf");
        embed_marker(&reformatted, &marked)?;
        if let Some(metadata) = ctx.metadata()? {
            metadata.is_reformatted_version = true;
        }
        ctx.log
            .info(&format!("Reformatted {} with k2pdfopt", path.display()));
        Ok(marked)
    }
}
