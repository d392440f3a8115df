use std::path::PathBuf;

use super::{Action, ActionContext, ActionId};
use crate::collaborators::FetchRequest;
use crate::error::ActionError;
use crate::formats::BookFormat;

/// Downloads the book an Adobe ACSM license points at.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchAcsm;

impl Action for FetchAcsm {
    fn id(&self) -> ActionId {
        ActionId::Fetch
    }

    fn description(&self) -> &'static str {
        "Download the ebook an ACSM license file refers to"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        if BookFormat::from_path(ctx.path) != BookFormat::Acsm {
            ctx.log
                .debug(&format!("Skipping {} because it's not an ACSM file.", ctx.path.display()));
            return Ok(ctx.path.to_path_buf());
        }
        let config = ctx
            .config
            .ok_or_else(|| ActionError::Fetch("no config found".to_string()))?;
        let (Some(user), Some(password)) = (
            config.adobe_user.as_deref().filter(|u| !u.is_empty()),
            config.adobe_password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(ActionError::Fetch(
                "no user or password found - add adobe_user and adobe_password to config file"
                    .to_string(),
            ));
        };

        if ctx.dry_run {
            ctx.log.dry_run(&format!(
                "would download {} as {user}",
                ctx.path.display()
            ));
            return Ok(ctx.path.to_path_buf());
        }

        let output_dir = ctx.staging_dir()?.join("fetched");
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| ActionError::io(format!("creating {}", output_dir.display()), e))?;
        let request = FetchRequest {
            acsm: ctx.path.to_path_buf(),
            user: user.to_string(),
            password: password.to_string(),
            store: config.adept_directory.clone(),
            output_dir,
        };
        let book = ctx.services.session.download(&request)?;
        ctx.log.info(&format!(
            "Downloaded {} to {}",
            ctx.path.display(),
            book.display()
        ));
        Ok(book)
    }
}
