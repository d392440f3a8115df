//! Expansion of command-line inputs into the files to process.
//!
//! An input is a file, a directory (walked recursively) or a glob pattern.
//! Inputs are made absolute so watcher events can be matched against them.
//! Walked and globbed files skip backups (`*.bak`), config files and hidden
//! entries; a file named explicitly is always taken.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use walkdir::WalkDir;

use crate::config::ConfigResolver;
use crate::logging::Log;

/// One command-line input.
#[derive(Debug, Clone)]
pub enum InputSpec {
    /// An existing regular file.
    File(PathBuf),
    /// An existing directory.
    Dir(PathBuf),
    /// Anything else, treated as a glob pattern.
    Glob(glob::Pattern),
}

impl InputSpec {
    /// Classify `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` names no existing path and is not a valid
    /// glob pattern.
    pub fn parse(spec: &str) -> Result<Self> {
        let path = Path::new(spec);
        if path.is_dir() {
            return Ok(Self::Dir(std::path::absolute(path)?));
        }
        if path.is_file() {
            return Ok(Self::File(std::path::absolute(path)?));
        }
        let absolute = if path.is_absolute() {
            spec.to_string()
        } else {
            let cwd = std::env::current_dir().context("reading current directory")?;
            format!(
                "{}{}{spec}",
                glob::Pattern::escape(&cwd.to_string_lossy()),
                std::path::MAIN_SEPARATOR
            )
        };
        glob::Pattern::new(&absolute)
            .map(Self::Glob)
            .with_context(|| format!("invalid glob pattern '{spec}'"))
    }

    /// Directory a watcher should observe for this input.
    #[must_use]
    pub fn watch_root(&self) -> PathBuf {
        match self {
            Self::Dir(dir) => dir.clone(),
            Self::File(file) => parent_or_dot(file),
            Self::Glob(pattern) => literal_prefix(pattern.as_str()),
        }
    }

    /// Whether a file appearing at `path` belongs to this input.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Dir(dir) => path.starts_with(dir),
            Self::File(file) => path == file,
            Self::Glob(pattern) => pattern.matches_path(path),
        }
    }
}

fn parent_or_dot(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Longest leading run of path components without glob metacharacters.
fn literal_prefix(pattern: &str) -> PathBuf {
    let literal: PathBuf = Path::new(pattern)
        .components()
        .take_while(|c| {
            !c.as_os_str()
                .to_string_lossy()
                .contains(['*', '?', '[', ']'])
        })
        .collect();
    if literal.as_os_str().is_empty() {
        PathBuf::from(".")
    } else if literal.is_file() {
        parent_or_dot(&literal)
    } else {
        literal
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

/// Whether a discovered (not explicitly named) file should be processed.
#[must_use]
pub fn is_candidate(path: &Path, resolver: &ConfigResolver) -> bool {
    !is_hidden(path)
        && path.extension().is_none_or(|e| !e.eq_ignore_ascii_case("bak"))
        && !resolver.is_config_file(path)
}

fn walk(dir: &Path, resolver: &ConfigResolver, out: &mut Vec<PathBuf>, log: &dyn Log) {
    let entries = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
    for entry in entries {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if is_candidate(entry.path(), resolver) {
                    out.push(entry.into_path());
                }
            }
            Ok(_) => {}
            Err(e) => log.warn(&format!("skipping unreadable entry under {}: {e}", dir.display())),
        }
    }
}

/// Expand `specs` into a deduplicated list of files, in input order.
///
/// # Errors
///
/// Returns an error for an invalid glob pattern.
pub fn expand(specs: &[String], resolver: &ConfigResolver, log: &dyn Log) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for spec in specs {
        let before = found.len();
        match InputSpec::parse(spec)? {
            InputSpec::File(file) => found.push(file),
            InputSpec::Dir(dir) => walk(&dir, resolver, &mut found, log),
            InputSpec::Glob(pattern) => {
                let matches = glob::glob(pattern.as_str())
                    .with_context(|| format!("invalid glob pattern '{spec}'"))?;
                for entry in matches {
                    match entry {
                        Ok(path) if path.is_dir() => walk(&path, resolver, &mut found, log),
                        Ok(path) if is_candidate(&path, resolver) => found.push(path),
                        Ok(_) => {}
                        Err(e) => log.warn(&format!("skipping {}: {e}", e.path().display())),
                    }
                }
            }
        }
        if found.len() == before {
            log.warn(&format!("no files match {spec}"));
        }
    }

    let mut seen = HashSet::new();
    found.retain(|path| seen.insert(dunce::canonicalize(path).unwrap_or_else(|_| path.clone())));
    Ok(found)
}
