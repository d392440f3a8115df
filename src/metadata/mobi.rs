use std::path::Path;

use super::{Metadata, non_empty};
use crate::error::ActionError;
use crate::formats::palmdb::{
    EXTH_AUTHOR, EXTH_PUBLISHED, EXTH_PUBLISHER, EXTH_SUBJECT, EXTH_TITLE, PalmDb, parse_mobi,
};

pub(super) fn read(path: &Path) -> Result<Option<Metadata>, ActionError> {
    let data = std::fs::read(path)
        .map_err(|e| ActionError::Metadata(format!("reading {}: {e}", path.display())))?;
    let header = parse_mobi(&data).ok_or_else(|| {
        ActionError::Metadata(format!("{} is not a Mobipocket book", path.display()))
    })?;
    let db_name = PalmDb::parse(&data).and_then(|db| non_empty(db.name()));
    let subjects = header.exth_strings(EXTH_SUBJECT);

    Ok(Some(Metadata {
        format: Some(if header.version >= 8 { "AZW3" } else { "MOBI" }.to_string()),
        encryption: (header.encryption != 0).then(|| "Kindle".to_string()),
        title: header
            .exth_string(EXTH_TITLE)
            .or_else(|| header.full_name.as_deref().and_then(non_empty))
            .or(db_name),
        author: header.exth_string(EXTH_AUTHOR),
        subject: subjects.first().cloned(),
        keywords: subjects,
        producer: header.exth_string(EXTH_PUBLISHER),
        creation_date: header.exth_string(EXTH_PUBLISHED),
        ..Metadata::default()
    }))
}
