//! Container detection, DRM scheme detection and the reformat sentinel.

pub mod drm;
pub mod marker;
pub mod palmdb;

use std::fmt;
use std::path::Path;

pub use drm::{Encryption, detect_encryption};

/// Ebook container type, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    /// EPUB (zip container).
    Epub,
    /// PDF.
    Pdf,
    /// Mobipocket family: `.mobi`, `.azw`, `.azw3`, `.prc`.
    Mobi,
    /// Kindle KFX: `.kfx`, `.kfx-zip`.
    Kfx,
    /// Adobe Content Server license (`.acsm`).
    Acsm,
    /// eReader PDB.
    Ereader,
    /// Anything else.
    Other,
}

impl BookFormat {
    /// Classify `path` by its (case-insensitive) extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("epub") => Self::Epub,
            Some("pdf") => Self::Pdf,
            Some("mobi" | "azw" | "azw3" | "prc") => Self::Mobi,
            Some("kfx" | "kfx-zip") => Self::Kfx,
            Some("acsm") => Self::Acsm,
            Some("pdb") => Self::Ereader,
            _ => Self::Other,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Epub => "EPUB",
            Self::Pdf => "PDF",
            Self::Mobi => "MOBI",
            Self::Kfx => "KFX",
            Self::Acsm => "ACSM",
            Self::Ereader => "eReader",
            Self::Other => "unknown",
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
