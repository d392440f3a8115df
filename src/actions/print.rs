use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::{Action, ActionContext, ActionId};
use crate::error::ActionError;
use crate::metadata::Metadata;

/// Prints the book's metadata to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintMetadata;

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("(none)")
}

/// Human-readable metadata report for `path`.
#[must_use]
pub fn report(path: &Path, metadata: Option<&Metadata>) -> String {
    let Some(m) = metadata else {
        return format!(
            "File {} has no metadata for one reason or another. It could be encrypted.",
            path.display()
        );
    };
    let mut out = format!("Metadata for {}:\n", path.display());
    if let Some(format) = &m.format {
        let _ = writeln!(out, "  Format: {format}");
    }
    if let Some(encryption) = &m.encryption {
        let _ = writeln!(out, "  Encryption: {encryption}");
    }
    let keywords = (!m.keywords.is_empty()).then(|| m.keywords.join(", "));
    let fields = [
        ("Title", m.title.as_deref()),
        ("Author", m.author.as_deref()),
        ("Subject", m.subject.as_deref()),
        ("Keywords", keywords.as_deref()),
        ("Creator", m.creator.as_deref()),
        ("Producer", m.producer.as_deref()),
        ("Creation Date", m.creation_date.as_deref()),
        ("Mod Date", m.mod_date.as_deref()),
    ];
    for (label, value) in fields {
        let _ = writeln!(out, "  {label}: {}", or_none(value));
    }
    if m.is_pdf() {
        let _ = writeln!(out, "  Is k2pdfopt version: {}", m.is_reformatted_version);
    }
    out.truncate(out.trim_end().len());
    out
}

impl Action for PrintMetadata {
    fn id(&self) -> ActionId {
        ActionId::Print
    }

    fn description(&self) -> &'static str {
        "Print the book's metadata"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        let path = ctx.path;
        let text = report(path, ctx.metadata()?.as_deref());
        ctx.log.print(&text);
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actions::test_helpers::{Harness, mock_services, reader_returning};

    #[test]
    fn report_lists_every_field() {
        let metadata = Metadata {
            format: Some("PDF 1.5".to_string()),
            title: Some("Essay".to_string()),
            author: Some("Ann".to_string()),
            keywords: vec!["a".to_string(), "b".to_string()],
            ..Metadata::default()
        };
        let text = report(Path::new("/b/essay.pdf"), Some(&metadata));
        assert_eq!(
            text,
            "Metadata for /b/essay.pdf:\n  Format: PDF 1.5\n  Title: Essay\n  Author: Ann\n  \
             Subject: (none)\n  Keywords: a, b\n  Creator: (none)\n  Producer: (none)\n  \
             Creation Date: (none)\n  Mod Date: (none)\n  Is k2pdfopt version: false"
        );
    }

    #[test]
    fn report_omits_reformat_flag_for_non_pdf() {
        let metadata = Metadata {
            format: Some("EPUB".to_string()),
            encryption: Some("Adobe".to_string()),
            ..Metadata::default()
        };
        let text = report(Path::new("b.epub"), Some(&metadata));
        assert!(text.contains("  Encryption: Adobe"));
        assert!(!text.contains("k2pdfopt"));
    }

    #[test]
    fn prints_fallback_without_metadata() {
        let mut services = mock_services();
        services.metadata = Arc::new(reader_returning(None));
        let mut h = Harness::new(services);
        let path = Path::new("/b/locked.epub");
        assert_eq!(h.run(&PrintMetadata, path).unwrap(), path);
        assert_eq!(
            h.log.at("print"),
            vec![
                "File /b/locked.epub has no metadata for one reason or another. It could be encrypted."
                    .to_string()
            ]
        );
    }
}
