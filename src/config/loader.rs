//! Raw configuration file parsing (TOML, YAML, JSON).
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// One configuration file as written on disk, before inheritance.
///
/// Every key is optional and unknown keys are ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub extends: Option<String>,
    pub actions: Option<Vec<String>>,
    pub adobe_key_files: Option<Vec<String>>,
    pub b_and_n_key_files: Option<Vec<String>>,
    pub kindle_pidnums: Option<Vec<String>>,
    pub kindle_serialnums: Option<Vec<String>>,
    pub kindle_database_files: Option<Vec<String>>,
    pub kindle_android_files: Option<Vec<String>>,
    pub pdf_passwords: Option<Vec<String>>,
    pub ereader_social_drm_file: Option<String>,
    pub adobe_user: Option<String>,
    pub adobe_password: Option<String>,
    pub dedrm_command: Option<String>,
    pub adept_directory: Option<String>,
}

/// Read and parse `path`, choosing the parser from its extension.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::UnsupportedExtension`] for an unrecognised extension and
/// [`ConfigError::InvalidSyntax`] if parsing or type checking fails.
pub fn load_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let format = match ext.as_deref() {
        Some("toml") => "TOML",
        Some("yaml" | "yml") => "YAML",
        Some("json") => "JSON",
        _ => {
            return Err(ConfigError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
    };

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |message: String| ConfigError::InvalidSyntax {
        path: path.to_path_buf(),
        format,
        message,
    };

    match format {
        "TOML" => toml::from_str(&content).map_err(|e| invalid(e.message().to_string())),
        "YAML" => {
            if content.trim().is_empty() {
                return Ok(RawConfig::default());
            }
            serde_yaml::from_str::<Option<RawConfig>>(&content)
                .map(Option::unwrap_or_default)
                .map_err(|e| invalid(e.to_string()))
        }
        _ => serde_json::from_str(&content).map_err(|e| invalid(e.to_string())),
    }
}
