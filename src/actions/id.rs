//! Action identifiers and their canonical execution order.

use std::fmt;
use std::str::FromStr;

/// Stable identifier of an action.
///
/// Variants are declared in canonical order, so the derived [`Ord`] is the
/// execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionId {
    /// Download the book an ACSM license points at.
    Fetch,
    /// Remove DRM.
    Drm,
    /// Convert KFX to EPUB.
    Kfx2Epub,
    /// Rename to `Author - Title.ext`.
    Rename,
    /// Reformat a PDF for small screens.
    Pdf,
    /// Print metadata.
    Print,
    /// Only compute metadata.
    None,
}

impl ActionId {
    /// All actions in the order they execute.
    pub const CANONICAL_ORDER: [Self; 7] = [
        Self::Fetch,
        Self::Drm,
        Self::Kfx2Epub,
        Self::Rename,
        Self::Pdf,
        Self::Print,
        Self::None,
    ];

    /// Action used when neither the caller nor any config names one.
    pub const DEFAULT: Self = Self::Print;

    /// Canonical string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Drm => "drm",
            Self::Kfx2Epub => "kfx2epub",
            Self::Rename => "rename",
            Self::Pdf => "pdf",
            Self::Print => "print",
            Self::None => "none",
        }
    }

    /// Accepted alternative spellings.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Fetch => &["download_acsm"],
            Self::Drm => &["decrypt"],
            Self::Kfx2Epub => &["convert"],
            Self::Pdf => &["reformat"],
            Self::Print => &["inspect"],
            Self::Rename | Self::None => &[],
        }
    }

    /// Comma-separated canonical identifiers, for error messages.
    #[must_use]
    pub fn valid_list() -> String {
        Self::CANONICAL_ORDER
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}'")]
pub struct UnknownActionId(pub String);

impl FromStr for ActionId {
    type Err = UnknownActionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::CANONICAL_ORDER
            .into_iter()
            .find(|id| id.as_str() == needle || id.aliases().contains(&needle.as_str()))
            .ok_or_else(|| UnknownActionId(s.to_string()))
    }
}
