use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{Metadata, non_empty};
use crate::error::ActionError;
use crate::formats::drm::zip_entry_to_string;

static ROOTFILE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"full-path\s*=\s*["']([^"']+)["']"#).ok());
static DC_ELEMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<dc:([a-z]+)\b[^>]*>(.*?)</dc:[a-z]+\s*>").ok());
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());

static ENTITY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").ok());

/// Character named by the body of an entity reference, e.g. `#8217` or `amp`.
fn entity_char(body: &str) -> Option<char> {
    let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = body.strip_prefix('#') {
        dec.parse().ok()?
    } else {
        return match body {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "amp" => Some('&'),
            _ => None,
        };
    };
    char::from_u32(code)
}

/// Strip markup from element text and decode entity references.
///
/// Unknown or invalid references are kept as written.
fn unescape(text: &str) -> String {
    let stripped = TAG
        .as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, "").into_owned());
    ENTITY.as_ref().map_or_else(
        || stripped.clone(),
        |re| {
            re.replace_all(&stripped, |caps: &regex::Captures<'_>| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                caps.get(1)
                    .and_then(|body| entity_char(body.as_str()))
                    .map_or_else(|| whole.to_string(), String::from)
            })
            .into_owned()
        },
    )
}

/// `(element, value)` pairs of every Dublin Core element in `opf`.
fn dc_elements(opf: &str) -> Vec<(String, String)> {
    DC_ELEMENT.as_ref().map_or_else(Vec::new, |re| {
        re.captures_iter(opf)
            .filter_map(|c| {
                let name = c.get(1)?.as_str().to_string();
                let value = non_empty(unescape(c.get(2)?.as_str()))?;
                Some((name, value))
            })
            .collect()
    })
}

pub(super) fn read(path: &Path) -> Result<Option<Metadata>, ActionError> {
    let invalid = |what: &str| ActionError::Metadata(format!("{} {what}", path.display()));
    let file = File::open(path)
        .map_err(|e| ActionError::Metadata(format!("reading {}: {e}", path.display())))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| invalid(&format!("is not a valid EPUB: {e}")))?;

    let container = zip_entry_to_string(&mut archive, "META-INF/container.xml")
        .ok_or_else(|| invalid("has no META-INF/container.xml"))?;
    let opf_path = ROOTFILE
        .as_ref()
        .and_then(|re| re.captures(&container))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| invalid("names no package document"))?;
    let opf = zip_entry_to_string(&mut archive, &opf_path)
        .ok_or_else(|| invalid(&format!("is missing {opf_path}")))?;

    let elements = dc_elements(&opf);
    let first = |name: &str| {
        elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    let subjects: Vec<String> = elements
        .iter()
        .filter(|(n, _)| n == "subject")
        .map(|(_, v)| v.clone())
        .collect();

    Ok(Some(Metadata {
        format: Some("EPUB".to_string()),
        title: first("title"),
        author: first("creator"),
        subject: subjects.first().cloned(),
        keywords: subjects,
        producer: first("publisher"),
        creation_date: first("date"),
        ..Metadata::default()
    }))
}

/// Write a minimal EPUB with the given OPF metadata block, for tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn write_test_epub(path: &Path, dc_metadata: &str) {
    use std::io::Write as _;
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let opts = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("mimetype", opts).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", opts).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?><container><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#,
    )
    .unwrap();
    zip.start_file("OEBPS/content.opf", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0"?><package xmlns:dc="http://purl.org/dc/elements/1.1/"><metadata>{dc_metadata}</metadata></package>"#
    )
    .unwrap();
    zip.finish().unwrap();
}
