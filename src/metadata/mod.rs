//! Book metadata and the per-transaction metadata cache.
//!
//! The [`MetadataReader`] collaborator extracts a [`Metadata`] record from a
//! file or reports that none is available. A transaction keeps the result in
//! a [`MetadataState`] so every action sees the same record and the reader is
//! consulted at most once.

mod epub;
mod mobi;
mod pdf;

use std::path::Path;

use crate::error::ActionError;
use crate::formats::{BookFormat, Encryption, detect_encryption};

/// Metadata extracted from a book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Container description, e.g. `PDF 1.7` or `EPUB`.
    pub format: Option<String>,
    /// Encryption scheme, when the file is encrypted.
    pub encryption: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Subject.
    pub subject: Option<String>,
    /// Keywords.
    pub keywords: Vec<String>,
    /// Creating application.
    pub creator: Option<String>,
    /// Producer or publisher.
    pub producer: Option<String>,
    /// Creation date as stored in the file.
    pub creation_date: Option<String>,
    /// Modification date as stored in the file.
    pub mod_date: Option<String>,
    /// Whether the file carries the reformat sentinel.
    pub is_reformatted_version: bool,
}

impl Metadata {
    /// Whether [`format`](Self::format) names a PDF.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.to_ascii_lowercase().starts_with("pdf"))
    }
}

/// Tri-state metadata cache for one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataState {
    /// Not yet attempted.
    #[default]
    Unknown,
    /// Attempted; the file has no extractable metadata.
    Absent,
    /// Attempted and available.
    Present(Metadata),
}

impl MetadataState {
    /// Return the cached record, consulting `reader` only on first use.
    ///
    /// # Errors
    ///
    /// Propagates the reader's [`ActionError::Metadata`]; the state stays
    /// [`Unknown`](Self::Unknown) in that case.
    pub fn resolve(
        &mut self,
        reader: &dyn MetadataReader,
        path: &Path,
    ) -> Result<Option<&mut Metadata>, ActionError> {
        if *self == Self::Unknown {
            *self = match reader.read(path)? {
                Some(metadata) => Self::Present(metadata),
                None => Self::Absent,
            };
        }
        Ok(match self {
            Self::Present(metadata) => Some(metadata),
            Self::Unknown | Self::Absent => None,
        })
    }
}

/// Metadata collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataReader: Send + Sync {
    /// Read metadata from `path`.
    ///
    /// Returns `Ok(None)` when the file has no metadata this reader can
    /// extract (unsupported extension, unreadable encrypted content).
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Metadata`] when a supported file is corrupt.
    fn read(&self, path: &Path) -> Result<Option<Metadata>, ActionError>;
}

/// Reader for PDF, EPUB and Mobipocket files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMetadataReader;

impl MetadataReader for DefaultMetadataReader {
    fn read(&self, path: &Path) -> Result<Option<Metadata>, ActionError> {
        let format = BookFormat::from_path(path);
        let metadata = match format {
            BookFormat::Pdf => return pdf::read(path),
            BookFormat::Epub => epub::read(path)?,
            BookFormat::Mobi => mobi::read(path)?,
            BookFormat::Kfx | BookFormat::Acsm | BookFormat::Ereader | BookFormat::Other => {
                return Ok(None);
            }
        };
        Ok(metadata.map(|mut m| {
            if m.encryption.is_none() {
                m.encryption = encryption_label(path, format);
            }
            m
        }))
    }
}

/// Label for the encryption of `path`, `None` when unencrypted or unknown.
fn encryption_label(path: &Path, format: BookFormat) -> Option<String> {
    match detect_encryption(path, format) {
        Ok(Encryption::Unencrypted) | Err(_) => None,
        Ok(scheme) => Some(scheme.to_string()),
    }
}

/// Trim and drop empty values.
fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
