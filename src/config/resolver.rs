//! Config discovery and `extends` chain resolution.
use std::path::{Path, PathBuf};

use super::Config;
use super::loader::load_file;
use crate::error::ConfigError;

/// Recognised config file names, highest precedence first.
pub const DEFAULT_FILE_NAMES: [&str; 4] = ["efm.toml", "efm.yaml", "efm.yml", "efm.json"];

/// Finds and resolves the configuration that applies to a directory.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    file_names: Vec<String>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_NAMES)
    }
}

impl ConfigResolver {
    /// Create a resolver that recognises `file_names`, in precedence order.
    #[must_use]
    pub fn new<I, S>(file_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_names: file_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `path` has one of the recognised config file names.
    #[must_use]
    pub fn is_config_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.file_names.iter().any(|f| f == n))
    }

    /// Return the nearest config file in `directory` or any ancestor.
    #[must_use]
    pub fn find(&self, directory: &Path) -> Option<PathBuf> {
        let start = dunce::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf());
        start.ancestors().find_map(|dir| {
            self.file_names
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Resolve the effective configuration for files in `directory`.
    ///
    /// Returns `Ok(None)` when no config file exists up to the filesystem
    /// root.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any file in the `extends` chain is
    /// unreadable, malformed or part of a cycle.
    pub fn resolve(&self, directory: &Path) -> Result<Option<Config>, ConfigError> {
        self.find(directory)
            .map(|path| self.load_chain(&path))
            .transpose()
    }

    /// Load `path` and every file it (transitively) extends, then merge them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ExtendsCycle`] if a file is visited twice and
    /// [`ConfigError::ExtendsNotFound`] if an `extends` target is missing.
    pub fn load_chain(&self, path: &Path) -> Result<Config, ConfigError> {
        let mut visited: Vec<PathBuf> = Vec::new();
        let mut layers: Vec<Config> = Vec::new();
        let mut next = Some(path.to_path_buf());

        while let Some(current) = next.take() {
            let canonical = dunce::canonicalize(&current).map_err(|source| ConfigError::Io {
                path: current.clone(),
                source,
            })?;
            if visited.contains(&canonical) {
                let chain = visited
                    .iter()
                    .chain(std::iter::once(&canonical))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ConfigError::ExtendsCycle(chain));
            }

            let mut raw = load_file(&canonical)?;
            if let Some(parent) = raw.extends.take() {
                let base = canonical.parent().unwrap_or_else(|| Path::new("/"));
                let target = super::resolve_path(base, &parent);
                if !target.is_file() {
                    return Err(ConfigError::ExtendsNotFound {
                        path: target,
                        from: canonical,
                    });
                }
                next = Some(target);
            }
            layers.push(Config::from_raw(raw, &canonical)?);
            visited.push(canonical);
        }

        Ok(layers
            .into_iter()
            .rev()
            .reduce(|parent, child| child.merge(parent))
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actions::ActionId;
    use std::fs;

    #[test]
    fn find_walks_up_to_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("efm.toml"), "").unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = ConfigResolver::default().find(&nested).unwrap();
        assert_eq!(found.file_name().unwrap(), "efm.toml");
    }

    #[test]
    fn nearest_file_wins_and_precedence_applies() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("efm.toml"), "actions = [\"print\"]").unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("efm.json"), r#"{"actions": ["pdf"]}"#).unwrap();
        fs::write(nested.join("efm.yaml"), "actions: [rename]").unwrap();
        let config = ConfigResolver::default().resolve(&nested).unwrap().unwrap();
        assert_eq!(config.actions, vec![ActionId::Rename]);
    }

    #[test]
    fn extends_resolves_relative_to_declaring_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("parent.toml"),
            "actions = [\"print\"]\nadobe_user = \"p\"",
        )
        .unwrap();
        let child_dir = dir.path().join("child");
        fs::create_dir(&child_dir).unwrap();
        fs::write(child_dir.join("efm.toml"), "extends = \"../parent.toml\"").unwrap();
        let config = ConfigResolver::default()
            .resolve(&child_dir)
            .unwrap()
            .unwrap();
        assert_eq!(config.actions, vec![ActionId::Print]);
        assert_eq!(config.adobe_user.as_deref(), Some("p"));
    }

    #[test]
    fn cycle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("efm.toml"), "extends = \"other.toml\"").unwrap();
        fs::write(dir.path().join("other.toml"), "extends = \"efm.toml\"").unwrap();
        let err = ConfigResolver::default().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ExtendsCycle(_)));
    }

    #[test]
    fn self_extends_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("efm.toml"), "extends = \"efm.toml\"").unwrap();
        let err = ConfigResolver::default().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ExtendsCycle(_)));
    }

    #[test]
    fn missing_parent_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("efm.toml"), "extends = \"gone.toml\"").unwrap();
        let err = ConfigResolver::default().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ExtendsNotFound { .. }));
    }

    #[test]
    fn custom_file_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("books.json"), r#"{"actions": ["none"]}"#).unwrap();
        let resolver = ConfigResolver::new(["books.json"]);
        let config = resolver.resolve(dir.path()).unwrap().unwrap();
        assert_eq!(config.actions, vec![ActionId::None]);
        assert!(resolver.is_config_file(&dir.path().join("books.json")));
        assert!(!resolver.is_config_file(&dir.path().join("efm.toml")));
    }
}
