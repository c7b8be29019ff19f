use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::error::ConfigError;
use crate::languages::LanguageRegistry;

/// Path segments pruned from every walk unless the caller builds its own
/// exclude set. Hidden (`.name`) segments are always pruned as well.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "__pycache__",
    "build",
    "build.rs",
    "CVS",
    "dist",
    "setup.py",
    "target",
];

/// Everything the counting engine needs to know about one run. Built once,
/// then only read.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub roots: Vec<PathBuf>,
    /// Canonical language names to count; empty means all.
    pub languages: BTreeSet<String>,
    pub skip_languages: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub includes: Vec<Pattern>,
    /// Over-width threshold in characters; 0 disables the check.
    pub max_width: usize,
    pub sort_by_lines: bool,
    pub summary: bool,
    /// Absolute files or folders the walk is restricted to; empty means
    /// unrestricted.
    pub files: BTreeSet<PathBuf>,
    pub comments: bool,
    pub jobs: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            roots: vec![PathBuf::from(".")],
            languages: BTreeSet::new(),
            skip_languages: BTreeSet::new(),
            excludes: default_excludes(),
            includes: Vec::new(),
            max_width: 0,
            sort_by_lines: false,
            summary: false,
            files: BTreeSet::new(),
            comments: false,
            jobs: num_cpus::get().max(1),
        }
    }
}

pub fn default_excludes() -> BTreeSet<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

impl Configuration {
    /// Check the invariants that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(lang) = self.languages.intersection(&self.skip_languages).next() {
            return Err(ConfigError::Conflict(lang.clone()));
        }
        if self.jobs == 0 {
            return Err(ConfigError::ZeroJobs);
        }
        Ok(())
    }
}

/// Map user-supplied language keys or names to canonical display names.
pub fn resolve_languages(
    names: &[String],
    registry: &LanguageRegistry,
) -> Result<BTreeSet<String>, ConfigError> {
    names
        .iter()
        .map(|name| {
            registry
                .lookup(name)
                .map(|lang| lang.name.clone())
                .ok_or_else(|| ConfigError::UnknownLanguage(name.clone()))
        })
        .collect()
}

pub fn compile_includes(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|err| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })
        })
        .collect()
}

/// Absolute form of `path`: canonical when it exists, otherwise joined onto
/// the current directory.
pub fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
