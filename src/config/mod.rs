//! Per-directory configuration with `extends` inheritance.
//!
//! A [`ConfigResolver`] finds the nearest `efm.*` file for a directory and
//! folds its `extends` chain into one effective [`Config`].

pub mod loader;
mod resolver;

pub use resolver::{ConfigResolver, DEFAULT_FILE_NAMES};

use std::path::{Path, PathBuf};

use crate::actions::ActionId;
use crate::error::ConfigError;
use loader::RawConfig;

/// Effective configuration for one transaction. Immutable once resolved.
///
/// Every field is optional in the files; an empty list means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// The config file nearest to the processed file.
    pub path: PathBuf,
    /// Requested actions, deduplicated, in the order first written.
    pub actions: Vec<ActionId>,
    /// Adobe ADEPT key files (epub and pdf).
    pub adobe_key_files: Vec<PathBuf>,
    /// Barnes & Noble key files.
    pub b_and_n_key_files: Vec<PathBuf>,
    /// Kindle PIDs.
    pub kindle_pidnums: Vec<String>,
    /// Kindle device serial numbers.
    pub kindle_serialnums: Vec<String>,
    /// Kindle for PC/Mac key databases.
    pub kindle_database_files: Vec<PathBuf>,
    /// Kindle for Android backup files.
    pub kindle_android_files: Vec<PathBuf>,
    /// Passwords tried on password-protected PDFs.
    pub pdf_passwords: Vec<String>,
    /// eReader social DRM key file.
    pub ereader_social_drm_file: Option<PathBuf>,
    /// Adobe account user name.
    pub adobe_user: Option<String>,
    /// Adobe account password.
    pub adobe_password: Option<String>,
    /// Program used by the default decryption adapter.
    pub dedrm_command: Option<String>,
    /// Account store used by the default session adapter.
    pub adept_directory: Option<PathBuf>,
}

impl Config {
    /// Build one layer from a parsed file, validating action identifiers and
    /// resolving relative paths against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAction`] for an unrecognised action.
    pub fn from_raw(raw: RawConfig, path: &Path) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let paths = |v: Option<Vec<String>>| -> Vec<PathBuf> {
            v.unwrap_or_default()
                .iter()
                .map(|p| resolve_path(base, p))
                .collect()
        };

        let mut actions = Vec::new();
        for name in raw.actions.unwrap_or_default() {
            let id = name
                .parse::<ActionId>()
                .map_err(|_| ConfigError::UnknownAction {
                    path: path.to_path_buf(),
                    action: name.clone(),
                    valid: ActionId::valid_list(),
                })?;
            if !actions.contains(&id) {
                actions.push(id);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            actions,
            adobe_key_files: paths(raw.adobe_key_files),
            b_and_n_key_files: paths(raw.b_and_n_key_files),
            kindle_pidnums: raw.kindle_pidnums.unwrap_or_default(),
            kindle_serialnums: raw.kindle_serialnums.unwrap_or_default(),
            kindle_database_files: paths(raw.kindle_database_files),
            kindle_android_files: paths(raw.kindle_android_files),
            pdf_passwords: raw.pdf_passwords.unwrap_or_default(),
            ereader_social_drm_file: raw
                .ereader_social_drm_file
                .map(|p| resolve_path(base, &p)),
            adobe_user: raw.adobe_user,
            adobe_password: raw.adobe_password,
            dedrm_command: raw.dedrm_command,
            adept_directory: raw.adept_directory.map(|p| resolve_path(base, &p)),
        })
    }

    /// Merge `self` (child) over `parent`.
    ///
    /// Scalars take the child's value when set; lists are the child's items
    /// followed by the parent's. `actions` is a set, so repeats are dropped.
    #[must_use]
    pub fn merge(self, parent: Self) -> Self {
        fn concat<T>(mut child: Vec<T>, parent: Vec<T>) -> Vec<T> {
            child.extend(parent);
            child
        }

        let mut actions = self.actions;
        for id in parent.actions {
            if !actions.contains(&id) {
                actions.push(id);
            }
        }

        Self {
            path: self.path,
            actions,
            adobe_key_files: concat(self.adobe_key_files, parent.adobe_key_files),
            b_and_n_key_files: concat(self.b_and_n_key_files, parent.b_and_n_key_files),
            kindle_pidnums: concat(self.kindle_pidnums, parent.kindle_pidnums),
            kindle_serialnums: concat(self.kindle_serialnums, parent.kindle_serialnums),
            kindle_database_files: concat(
                self.kindle_database_files,
                parent.kindle_database_files,
            ),
            kindle_android_files: concat(self.kindle_android_files, parent.kindle_android_files),
            pdf_passwords: concat(self.pdf_passwords, parent.pdf_passwords),
            ereader_social_drm_file: self
                .ereader_social_drm_file
                .or(parent.ereader_social_drm_file),
            adobe_user: self.adobe_user.or(parent.adobe_user),
            adobe_password: self.adobe_password.or(parent.adobe_password),
            dedrm_command: self.dedrm_command.or(parent.dedrm_command),
            adept_directory: self.adept_directory.or(parent.adept_directory),
        }
    }
}

/// Expand a leading `~` and make `p` absolute relative to `base`.
pub(crate) fn resolve_path(base: &Path, p: &str) -> PathBuf {
    let expanded = match p.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map_or_else(
                    || PathBuf::from(p),
                    |home| PathBuf::from(home).join(rest.trim_start_matches(['/', '\\'])),
                )
        }
        _ => PathBuf::from(p),
    };
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
