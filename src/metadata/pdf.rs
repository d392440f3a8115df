use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use super::{Metadata, non_empty};
use crate::error::ActionError;
use crate::formats::drm::detect_pdf;
use crate::formats::marker::has_marker;
use crate::formats::Encryption;

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// treated as Latin-1.
pub(super) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .filter_map(|c| <[u8; 2]>::try_from(c).ok().map(u16::from_be_bytes))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().copied().map(char::from).collect()
}

fn info_dict(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_text(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let value = match info.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match value {
        Object::String(bytes, _) => non_empty(decode_text(bytes)),
        Object::Name(name) => non_empty(String::from_utf8_lossy(name)),
        _ => None,
    }
}

pub(super) fn read(path: &Path) -> Result<Option<Metadata>, ActionError> {
    let data = std::fs::read(path)
        .map_err(|e| ActionError::Metadata(format!("reading {}: {e}", path.display())))?;
    let encryption = detect_pdf(&data);
    let doc = match Document::load_mem(&data) {
        Ok(doc) => doc,
        Err(_) if encryption != Encryption::Unencrypted => return Ok(None),
        Err(e) => {
            return Err(ActionError::Metadata(format!("{}: {e}", path.display())));
        }
    };

    let format = format!("PDF {}", doc.version);
    let mut metadata = Metadata {
        is_reformatted_version: has_marker(&doc),
        format: Some(format),
        encryption: (encryption != Encryption::Unencrypted).then(|| encryption.to_string()),
        ..Metadata::default()
    };
    if let Some(info) = info_dict(&doc) {
        let text = |key: &[u8]| info_text(&doc, info, key);
        metadata.title = text(b"Title");
        metadata.author = text(b"Author");
        metadata.subject = text(b"Subject");
        metadata.keywords = text(b"Keywords")
            .map(|k| k.split(',').filter_map(non_empty).collect())
            .unwrap_or_default();
        metadata.creator = text(b"Creator");
        metadata.producer = text(b"Producer");
        metadata.creation_date = text(b"CreationDate");
        metadata.mod_date = text(b"ModDate");
    }
    Ok(Some(metadata))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::formats::marker::{embed_marker, write_test_pdf};

    #[test]
    fn reads_info_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("essay.pdf");
        write_test_pdf(
            &path,
            &[
                ("Title", "An Essay"),
                ("Author", "Ann Author"),
                ("Keywords", "history, war,,"),
                ("CreationDate", "D:20240101120000Z"),
            ],
        );
        let m = read(&path).unwrap().unwrap();
        assert_eq!(m.format.as_deref(), Some("PDF 1.5"));
        assert_eq!(m.title.as_deref(), Some("An Essay"));
        assert_eq!(m.author.as_deref(), Some("Ann Author"));
        assert_eq!(m.keywords, vec!["history", "war"]);
        assert_eq!(m.creation_date.as_deref(), Some("D:20240101120000Z"));
        assert_eq!(m.encryption, None);
        assert!(!m.is_reformatted_version);
    }

    #[test]
    fn reports_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.pdf");
        let marked = dir.path().join("marked.pdf");
        write_test_pdf(&plain, &[("Title", "T")]);
        embed_marker(&plain, &marked).unwrap();
        let m = read(&marked).unwrap().unwrap();
        assert!(m.is_reformatted_version);
        assert_eq!(m.title.as_deref(), Some("T"));
    }

    #[test]
    fn garbage_is_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(read(&path), Err(ActionError::Metadata(_))));
    }

    #[test]
    fn decodes_utf16_and_latin1() {
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_text(&[0x43, 0x61, 0x66, 0xE9]), "Café");
        assert_eq!(decode_text(&[0xEF, 0xBB, 0xBF, 0x68, 0x69]), "hi");
    }
}
