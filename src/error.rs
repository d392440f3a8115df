//! Domain-specific error types for the ebook folder manager.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`], [`ActionError`])
//! while command handlers at the CLI boundary work with [`anyhow::Error`].
//! A transaction attaches the offending file to its failure by wrapping the
//! typed error in a [`FileError`]; the batch driver downcasts to that type to
//! tell a per-file data condition (reported, batch continues) from an
//! unexpected defect (run aborts).
//!
//! # Error hierarchy
//!
//! ```text
//! FileError { path, staging }
//! └── EfmError
//!     ├── Config(ConfigError)  # config discovery, parsing, `extends` chains
//!     ├── Action(ActionError)  # a pipeline step could not complete
//!     └── Commit(CommitError)  # backing up the original / installing the result
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level typed error for a single file's transaction.
#[derive(Error, Debug)]
pub enum EfmError {
    /// Configuration-related error (discovery, parsing, inheritance).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An action in the pipeline failed.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The commit step failed; the original file is left in place.
    #[error("Commit failed: {0}")]
    Commit(#[from] CommitError),
}

impl EfmError {
    /// Stable, human-readable name of the error kind for aggregate reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Action(e) => e.kind(),
            Self::Commit(CommitError::BackupCollision { .. }) => "BackupCollisionError",
            Self::Commit(_) => "CommitError",
        }
    }
}

/// Errors that arise from configuration discovery and loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file could not be parsed or does not match the schema.
    #[error("Invalid {format} in {path}: {message}")]
    InvalidSyntax {
        /// Path of the offending file.
        path: PathBuf,
        /// Format the file was parsed as (`TOML`, `YAML`, `JSON`).
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The config file extension is not one of toml/yaml/yml/json.
    #[error("Unknown config file extension: {path}")]
    UnsupportedExtension {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// The `actions` list names an action that does not exist.
    #[error("Unknown action '{action}' in {path}: must be one of {valid}")]
    UnknownAction {
        /// Path of the offending file.
        path: PathBuf,
        /// The unrecognized identifier.
        action: String,
        /// Comma-separated list of valid identifiers.
        valid: String,
    },

    /// The file referenced by `extends` does not exist.
    #[error("{from} extends {path}, which does not exist")]
    ExtendsNotFound {
        /// Missing parent path.
        path: PathBuf,
        /// Config file that declared the `extends`.
        from: PathBuf,
    },

    /// The `extends` chain revisits a file.
    #[error("Config extends cycle detected: {0}")]
    ExtendsCycle(String),
}

/// Errors raised by a single action.
///
/// The offending file path is attached by the transaction through
/// [`FileError`], so variants only carry the cause.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The metadata collaborator failed, or an action needs metadata the file lacks.
    #[error("Couldn't get metadata - {0}")]
    Metadata(String),

    /// The action has no handling for the file's detected type.
    #[error("Unsupported format {0}")]
    UnsupportedFormat(String),

    /// Keys or credentials required by the detected scheme are missing.
    #[error("Missing required key for {scheme}, add to your config file{}", detail_suffix(.detail.as_deref()))]
    MissingKeyMaterial {
        /// Detected encryption scheme.
        scheme: String,
        /// Extra detail, e.g. the key file that could not be found.
        detail: Option<String>,
    },

    /// The scheme was detected but is deliberately not supported.
    #[error("{0} encryption is not supported")]
    UnsupportedEncryption(String),

    /// The decryption collaborator failed for every key candidate.
    #[error("Couldn't remove DRM - {0}")]
    Decryption(String),

    /// The external reformat tool failed.
    #[error("Couldn't reformat PDF - {0}")]
    Reformat(String),

    /// The conversion collaborator failed.
    #[error("Couldn't convert format - {0}")]
    Conversion(String),

    /// The license download failed or could not be attempted.
    #[error("Couldn't download - {0}")]
    Fetch(String),

    /// A staging-area filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map_or_else(String::new, |d| format!(" - {d}"))
}

impl ActionError {
    /// Wrap an I/O error with a short description of the attempted operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "MetadataError",
            Self::UnsupportedFormat(_) => "UnsupportedFormatError",
            Self::MissingKeyMaterial { .. } => "MissingKeyMaterialError",
            Self::UnsupportedEncryption(_) => "UnsupportedEncryptionError",
            Self::Decryption(_) => "DecryptionFailure",
            Self::Reformat(_) => "ReformatFailure",
            Self::Conversion(_) => "ConversionFailure",
            Self::Fetch(_) => "FetchFailure",
            Self::Io { .. } => "IoError",
        }
    }
}

/// Errors raised while committing a transaction.
#[derive(Error, Debug)]
pub enum CommitError {
    /// No free backup name was found within the probe limit.
    #[error("no free backup name for {path} after {attempts} attempts")]
    BackupCollision {
        /// Original file path.
        path: PathBuf,
        /// Number of candidates probed.
        attempts: usize,
    },

    /// The renamed result would overwrite an unrelated existing file.
    #[error("refusing to overwrite existing file {0}")]
    TargetExists(PathBuf),

    /// A filesystem operation failed during commit.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// A typed failure for one input file.
///
/// Carries the original file path and, when the staging directory was
/// retained for diagnosis, its location.
#[derive(Error, Debug)]
#[error("{}: {source}{}", .path.display(), staging_suffix(.staging.as_ref()))]
pub struct FileError {
    /// The original input file.
    pub path: PathBuf,
    /// Retained staging directory, if any.
    pub staging: Option<PathBuf>,
    /// The typed cause.
    #[source]
    pub source: EfmError,
}

fn staging_suffix(staging: Option<&PathBuf>) -> String {
    staging.map_or_else(String::new, |s| {
        format!(" (intermediate files are in {})", s.display())
    })
}

impl FileError {
    /// Attach `path` to a typed error.
    pub fn new(path: impl Into<PathBuf>, source: impl Into<EfmError>) -> Self {
        Self {
            path: path.into(),
            staging: None,
            source: source.into(),
        }
    }

    /// Record the retained staging directory.
    #[must_use]
    pub fn with_staging(mut self, staging: Option<PathBuf>) -> Self {
        self.staging = staging;
        self
    }

    /// Stable name of the underlying error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // ConfigError
    // -----------------------------------------------------------------------

    #[test]
    fn config_error_unknown_action_display() {
        let e = ConfigError::UnknownAction {
            path: PathBuf::from("/books/efm.toml"),
            action: "explode".to_string(),
            valid: "print, none".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Unknown action 'explode' in /books/efm.toml: must be one of print, none"
        );
    }

    #[test]
    fn config_error_io_has_source() {
        use std::error::Error as StdError;
        let e = ConfigError::Io {
            path: PathBuf::from("/books/efm.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("/books/efm.toml"));
    }

    #[test]
    fn config_error_cycle_display() {
        let e = ConfigError::ExtendsCycle("a.toml -> b.toml -> a.toml".to_string());
        assert_eq!(
            e.to_string(),
            "Config extends cycle detected: a.toml -> b.toml -> a.toml"
        );
    }

    // -----------------------------------------------------------------------
    // ActionError
    // -----------------------------------------------------------------------

    #[test]
    fn missing_key_display_without_detail() {
        let e = ActionError::MissingKeyMaterial {
            scheme: "Kindle".to_string(),
            detail: None,
        };
        assert_eq!(
            e.to_string(),
            "Missing required key for Kindle, add to your config file"
        );
    }

    #[test]
    fn missing_key_display_with_detail() {
        let e = ActionError::MissingKeyMaterial {
            scheme: "Adobe".to_string(),
            detail: Some("Key file /k/adobe.der not found".to_string()),
        };
        assert!(e.to_string().ends_with(" - Key file /k/adobe.der not found"));
    }

    #[test]
    fn unsupported_encryption_display() {
        let e = ActionError::UnsupportedEncryption("Readium LCP".to_string());
        assert_eq!(e.to_string(), "Readium LCP encryption is not supported");
    }

    #[test]
    fn action_error_kinds_are_distinct() {
        let kinds = [
            ActionError::Metadata(String::new()).kind(),
            ActionError::UnsupportedFormat(String::new()).kind(),
            ActionError::MissingKeyMaterial {
                scheme: String::new(),
                detail: None,
            }
            .kind(),
            ActionError::UnsupportedEncryption(String::new()).kind(),
            ActionError::Decryption(String::new()).kind(),
            ActionError::Reformat(String::new()).kind(),
            ActionError::Conversion(String::new()).kind(),
            ActionError::Fetch(String::new()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    // -----------------------------------------------------------------------
    // FileError
    // -----------------------------------------------------------------------

    #[test]
    fn file_error_display_includes_path_and_cause() {
        let e = FileError::new(
            "/books/novel.azw3",
            ActionError::MissingKeyMaterial {
                scheme: "Kindle".to_string(),
                detail: None,
            },
        );
        let text = e.to_string();
        assert!(text.starts_with("/books/novel.azw3: "));
        assert!(text.contains("Kindle"));
        assert_eq!(e.kind(), "MissingKeyMaterialError");
    }

    #[test]
    fn file_error_display_includes_staging() {
        let e = FileError::new("/books/a.pdf", ActionError::Reformat("exit 1".to_string()))
            .with_staging(Some(PathBuf::from("/tmp/efm-a.pdf-x")));
        assert!(e.to_string().contains("intermediate files are in /tmp/efm-a.pdf-x"));
    }

    #[test]
    fn backup_collision_kind() {
        let e: EfmError = CommitError::BackupCollision {
            path: PathBuf::from("/b/x.pdf"),
            attempts: 1000,
        }
        .into();
        assert_eq!(e.kind(), "BackupCollisionError");
    }

    #[test]
    fn config_error_kind() {
        let e: EfmError = ConfigError::ExtendsCycle("a".to_string()).into();
        assert_eq!(e.kind(), "ConfigError");
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<EfmError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<ActionError>();
        assert_send_sync::<CommitError>();
        assert_send_sync::<FileError>();
    }

    #[test]
    fn file_error_downcasts_from_anyhow() {
        let e: anyhow::Error = FileError::new("/b/x.epub", ActionError::Fetch("x".into())).into();
        let typed = e.downcast::<FileError>().unwrap();
        assert_eq!(typed.kind(), "FetchFailure");
    }
}
