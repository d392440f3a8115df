//! Sentinel embedded in reformatted PDFs.
//!
//! A reformatted PDF carries an embedded file named [`MARKER_NAME`] whose
//! payload is `{"k2pdfopt_version":true}`. Its presence means the file is
//! already the reformatted version and must not be reformatted again.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::Serialize;

use crate::error::ActionError;

/// Name of the embedded sentinel file.
pub const MARKER_NAME: &str = "__ebooks-folder-manager.json";

#[derive(Serialize)]
struct MarkerPayload {
    k2pdfopt_version: bool,
}

/// Resolve `obj` to a dictionary, returning it with its object id if it was
/// an indirect reference.
fn resolve_dict(doc: &Document, obj: Option<&Object>) -> (Dictionary, Option<ObjectId>) {
    match obj {
        Some(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map_or_else(|_| (Dictionary::new(), None), |d| (d.clone(), Some(*id))),
        Some(Object::Dictionary(d)) => (d.clone(), None),
        _ => (Dictionary::new(), None),
    }
}

fn catalog_id(doc: &Document) -> Option<ObjectId> {
    match doc.trailer.get(b"Root").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

fn embedded_files_node(doc: &Document) -> Option<Dictionary> {
    let catalog = doc.get_dictionary(catalog_id(doc)?).ok()?;
    let (names, _) = resolve_dict(doc, catalog.get(b"Names").ok());
    let node = names.get(b"EmbeddedFiles").ok()?;
    Some(resolve_dict(doc, Some(node)).0)
}

fn names_array_contains(doc: &Document, node: &Dictionary, name: &[u8]) -> bool {
    let in_leaf = matches!(node.get(b"Names"), Ok(Object::Array(items))
        if items.iter().step_by(2).any(|k| matches!(k, Object::String(s, _) if s == name)));
    if in_leaf {
        return true;
    }
    match node.get(b"Kids") {
        Ok(Object::Array(kids)) => kids
            .iter()
            .any(|kid| names_array_contains(doc, &resolve_dict(doc, Some(kid)).0, name)),
        _ => false,
    }
}

/// Whether `doc` carries the reformat sentinel.
#[must_use]
pub fn has_marker(doc: &Document) -> bool {
    embedded_files_node(doc)
        .is_some_and(|node| names_array_contains(doc, &node, MARKER_NAME.as_bytes()))
}

/// Copy `input` to `output`, adding the reformat sentinel.
///
/// Other embedded files and other `/Names` entries are preserved.
///
/// # Errors
///
/// Returns [`ActionError::Reformat`] if the PDF cannot be loaded, has no
/// catalog, or cannot be saved.
pub fn embed_marker(input: &Path, output: &Path) -> Result<(), ActionError> {
    let fail = |what: &str, e: &dyn std::fmt::Display| {
        ActionError::Reformat(format!("{what} {}: {e}", input.display()))
    };
    let mut doc = Document::load(input).map_err(|e| fail("couldn't load", &e))?;
    add_marker(&mut doc).map_err(|e| fail("couldn't mark", &e))?;
    doc.save(output)
        .map_err(|e| ActionError::Reformat(format!("couldn't save {}: {e}", output.display())))?;
    Ok(())
}

/// Add the sentinel to an in-memory document.
///
/// # Errors
///
/// Returns an error message if the document has no catalog.
pub fn add_marker(doc: &mut Document) -> Result<(), String> {
    let root = catalog_id(doc).ok_or_else(|| "missing document catalog".to_string())?;
    let payload = serde_json::to_vec(&MarkerPayload {
        k2pdfopt_version: true,
    })
    .map_err(|e| e.to_string())?;

    let stream_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        payload,
    ));
    let spec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(MARKER_NAME),
        "UF" => Object::string_literal(MARKER_NAME),
        "EF" => dictionary! { "F" => stream_id },
    });

    let catalog = doc.get_dictionary(root).map_err(|e| e.to_string())?.clone();
    let (mut names, names_id) = resolve_dict(doc, catalog.get(b"Names").ok());
    let (mut embedded, embedded_id) = resolve_dict(doc, names.get(b"EmbeddedFiles").ok());

    let key = Object::String(MARKER_NAME.as_bytes().to_vec(), StringFormat::Literal);
    match embedded.get_mut(b"Names") {
        Ok(Object::Array(items)) => insert_sorted(items, key, spec_id),
        _ => {
            if let Ok(Object::Array(kids)) = embedded.get_mut(b"Kids") {
                let leaf = doc.add_object(dictionary! {
                    "Names" => vec![key.clone(), spec_id.into()],
                    "Limits" => vec![key.clone(), key],
                });
                kids.push(leaf.into());
            } else {
                embedded.set("Names", vec![key, spec_id.into()]);
            }
        }
    }

    match embedded_id {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(embedded));
        }
        None => names.set("EmbeddedFiles", embedded),
    }
    match names_id {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(names));
        }
        None => {
            let mut catalog = catalog;
            catalog.set("Names", names);
            doc.objects.insert(root, Object::Dictionary(catalog));
        }
    }
    Ok(())
}

/// Insert `(key, value)` into a flat name-tree array, keeping keys sorted
/// and replacing an existing entry with the same key.
fn insert_sorted(items: &mut Vec<Object>, key: Object, value: ObjectId) {
    let key_bytes = match &key {
        Object::String(s, _) => s.clone(),
        _ => Vec::new(),
    };
    let mut pos = items.len();
    let mut replace = false;
    for (i, existing) in items.iter().enumerate().step_by(2) {
        if let Object::String(s, _) = existing {
            if *s == key_bytes {
                pos = i;
                replace = true;
                break;
            }
            if *s > key_bytes {
                pos = i;
                break;
            }
        }
    }
    if replace {
        if let Some(slot) = items.get_mut(pos + 1) {
            *slot = value.into();
        }
    } else {
        let pos = pos.min(items.len());
        items.insert(pos, value.into());
        items.insert(pos, key);
    }
}

/// Write a one-page PDF with the given Info entries, for tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn write_test_pdf(path: &Path, info: &[(&str, &str)]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if !info.is_empty() {
        let mut dict = Dictionary::new();
        for (k, v) in info {
            dict.set(k.as_bytes().to_vec(), Object::string_literal(*v));
        }
        let info_id = doc.add_object(dict);
        doc.trailer.set("Info", info_id);
    }
    doc.save(path).unwrap();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pdf_has_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("essay.pdf");
        write_test_pdf(&path, &[("Title", "Essay")]);
        assert!(!has_marker(&Document::load(&path).unwrap()));
    }

    #[test]
    fn embed_then_detect() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        write_test_pdf(&input, &[]);
        embed_marker(&input, &output).unwrap();
        assert!(has_marker(&Document::load(&output).unwrap()));
        assert!(!has_marker(&Document::load(&input).unwrap()));
    }

    #[test]
    fn existing_embedded_files_are_kept() {
        let mut doc = Document::with_version("1.5");
        let other = doc.add_object(dictionary! { "Type" => "Filespec" });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Names" => dictionary! {
                "Dests" => dictionary! {},
                "EmbeddedFiles" => dictionary! {
                    "Names" => vec![Object::string_literal("zz.txt"), other.into()],
                },
            },
        });
        doc.trailer.set("Root", catalog_id);
        add_marker(&mut doc).unwrap();
        assert!(has_marker(&doc));
        let node = embedded_files_node(&doc).unwrap();
        assert!(names_array_contains(&doc, &node, b"zz.txt"));
        let catalog = doc.get_dictionary(catalog_id).unwrap();
        let (names, _) = resolve_dict(&doc, catalog.get(b"Names").ok());
        assert!(names.get(b"Dests").is_ok());
    }

    #[test]
    fn insert_sorted_orders_and_replaces() {
        let mut items = vec![Object::string_literal("b"), Object::Reference((1, 0))];
        insert_sorted(&mut items, Object::string_literal("a"), (2, 0));
        insert_sorted(&mut items, Object::string_literal("c"), (3, 0));
        insert_sorted(&mut items, Object::string_literal("a"), (4, 0));
        let keys: Vec<_> = items
            .iter()
            .step_by(2)
            .map(|o| match o {
                Object::String(s, _) => String::from_utf8_lossy(s).into_owned(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(items.len(), 6);
        assert_eq!(items.get(1), Some(&Object::Reference((4, 0))));
    }
}
