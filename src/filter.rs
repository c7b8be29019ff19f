use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Component, Path};

use crate::config::Configuration;
use crate::languages::{LanguageDescriptor, LanguageRegistry};

const SHEBANG_SNIFF_LEN: u64 = 256;

/// The rule that rejected a path, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    Hidden,
    NotListed,
    NotIncluded,
    UnknownLanguage,
    SkippedLanguage,
    NotSelected,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rejection::Excluded => "excluded name",
            Rejection::Hidden => "hidden",
            Rejection::NotListed => "not in the file list",
            Rejection::NotIncluded => "no include pattern matches",
            Rejection::UnknownLanguage => "unknown language",
            Rejection::SkippedLanguage => "language skipped",
            Rejection::NotSelected => "language not selected",
        };
        f.write_str(text)
    }
}

/// Decides which paths are counted.
#[derive(Debug, Clone, Copy)]
pub struct PathFilter<'a> {
    config: &'a Configuration,
    registry: &'a LanguageRegistry,
}

impl<'a> PathFilter<'a> {
    pub fn new(config: &'a Configuration, registry: &'a LanguageRegistry) -> Self {
        PathFilter { config, registry }
    }

    pub fn config(&self) -> &'a Configuration {
        self.config
    }

    /// Apply the filter rules to a file below `root` (or equal to it when
    /// the root is itself a file). The first rule that matches decides.
    pub fn check(&self, path: &Path, root: &Path) -> Result<&'a LanguageDescriptor, Rejection> {
        self.check_segments(path, root)?;

        if !self.config.files.is_empty()
            && !self.config.files.iter().any(|member| path.starts_with(member))
        {
            return Err(Rejection::NotListed);
        }

        if !self.config.includes.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if !self.config.includes.iter().any(|p| p.matches(&name)) {
                return Err(Rejection::NotIncluded);
            }
        }

        let language = self.classify(path).ok_or(Rejection::UnknownLanguage)?;

        if self.config.skip_languages.contains(&language.name) {
            return Err(Rejection::SkippedLanguage);
        }
        if !self.config.languages.is_empty() && !self.config.languages.contains(&language.name) {
            return Err(Rejection::NotSelected);
        }
        Ok(language)
    }

    /// Whether the walk should descend into `dir`. Only the name rules and
    /// the explicit file list apply; roots are never pruned.
    pub fn dir_in_scope(&self, dir: &Path, root: &Path) -> Result<(), Rejection> {
        if dir == root {
            return Ok(());
        }
        self.check_segments(dir, root)?;
        if !self.config.files.is_empty()
            && !self
                .config
                .files
                .iter()
                .any(|member| dir.starts_with(member) || member.starts_with(dir))
        {
            return Err(Rejection::NotListed);
        }
        Ok(())
    }

    fn check_segments(&self, path: &Path, root: &Path) -> Result<(), Rejection> {
        let relative = match path.strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => Path::new(path.file_name().unwrap_or_default()),
        };
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            let segment = segment.to_string_lossy();
            if self.config.excludes.contains(segment.as_ref()) {
                return Err(Rejection::Excluded);
            }
            if segment.len() > 1 && segment.starts_with('.') {
                return Err(Rejection::Hidden);
            }
        }
        Ok(())
    }

    fn classify(&self, path: &Path) -> Option<&'a LanguageDescriptor> {
        if let Some(language) = self.registry.classify(path) {
            return Some(language);
        }
        if path.extension().is_some() {
            return None;
        }
        let first_line = read_first_line(path)?;
        self.registry.classify_shebang(&first_line)
    }
}

fn read_first_line(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let mut head = Vec::with_capacity(SHEBANG_SNIFF_LEN as usize);
    file.take(SHEBANG_SNIFF_LEN).read_to_end(&mut head).ok()?;
    let line = head.split(|&b| b == b'\n').next().unwrap_or(&[]);
    Some(String::from_utf8_lossy(line).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{compile_includes, Configuration};
    use std::io;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn check(config: &Configuration, path: &str) -> Result<String, Rejection> {
        let registry = LanguageRegistry::builtin();
        let filter = PathFilter::new(config, &registry);
        let result = filter
            .check(&Path::new("/work").join(path), Path::new("/work"))
            .map(|lang| lang.name.clone());
        result
    }

    #[test]
    fn test_accepts_known_language() {
        let config = Configuration::default();
        assert_eq!(check(&config, "src/a.py"), Ok("Python".to_string()));
        assert_eq!(check(&config, "Makefile"), Ok("Makefile".to_string()));
    }

    #[test]
    fn test_excluded_segments_reject() {
        let config = Configuration::default();
        assert_eq!(check(&config, "build/c.py"), Err(Rejection::Excluded));
        assert_eq!(check(&config, "x/target/debug/a.rs"), Err(Rejection::Excluded));
        assert_eq!(check(&config, "setup.py"), Err(Rejection::Excluded));
        assert_eq!(check(&config, "build.rs"), Err(Rejection::Excluded));
    }

    #[test]
    fn test_segments_are_relative_to_root() {
        let config = Configuration::default();
        let registry = LanguageRegistry::builtin();
        let filter = PathFilter::new(&config, &registry);
        let root = Path::new("/home/me/build/.proj");
        assert!(filter.check(&root.join("src/a.py"), root).is_ok());
    }

    #[test]
    fn test_hidden_segments_always_reject() {
        let mut config = Configuration::default();
        config.excludes.clear();
        assert_eq!(check(&config, ".git/hooks/pre.py"), Err(Rejection::Hidden));
        assert_eq!(check(&config, "src/.hidden.rs"), Err(Rejection::Hidden));
    }

    #[test]
    fn test_exclusion_precedes_file_list() {
        let mut config = Configuration::default();
        config.files.insert(PathBuf::from("/work/build/c.py"));
        assert_eq!(check(&config, "build/c.py"), Err(Rejection::Excluded));
    }

    #[test]
    fn test_file_list_restricts_to_members() {
        let mut config = Configuration::default();
        config.files.insert(PathBuf::from("/work/src"));
        config.files.insert(PathBuf::from("/work/tool.sh"));
        assert_eq!(check(&config, "src/deep/a.rs"), Ok("Rust".to_string()));
        assert_eq!(check(&config, "tool.sh"), Ok("Shell".to_string()));
        assert_eq!(check(&config, "other/a.rs"), Err(Rejection::NotListed));
        assert_eq!(check(&config, "srcx/a.rs"), Err(Rejection::NotListed));
    }

    #[test]
    fn test_include_patterns_match_basename() {
        let config = Configuration {
            includes: compile_includes(&["test_*.py".to_string(), "*.go".to_string()])
                .expect("patterns compile"),
            ..Configuration::default()
        };
        assert_eq!(check(&config, "pkg/test_util.py"), Ok("Python".to_string()));
        assert_eq!(check(&config, "cmd/main.go"), Ok("Go".to_string()));
        assert_eq!(check(&config, "pkg/util.py"), Err(Rejection::NotIncluded));
    }

    #[test]
    fn test_unknown_language_rejects() {
        let config = Configuration {
            includes: compile_includes(&["*".to_string()]).expect("pattern compiles"),
            ..Configuration::default()
        };
        assert_eq!(check(&config, "notes.txt"), Err(Rejection::UnknownLanguage));
    }

    #[test]
    fn test_language_lists() {
        let mut config = Configuration::default();
        config.skip_languages.insert("Rust".to_string());
        assert_eq!(check(&config, "a.rs"), Err(Rejection::SkippedLanguage));
        assert_eq!(check(&config, "a.go"), Ok("Go".to_string()));

        let mut config = Configuration::default();
        config.languages.insert("Python".to_string());
        assert_eq!(check(&config, "a.py"), Ok("Python".to_string()));
        assert_eq!(check(&config, "b.js"), Err(Rejection::NotSelected));
    }

    #[test]
    fn test_dir_in_scope() {
        let mut config = Configuration::default();
        let registry = LanguageRegistry::builtin();
        let root = Path::new("/work");
        {
            let filter = PathFilter::new(&config, &registry);
            assert_eq!(filter.dir_in_scope(root, root), Ok(()));
            assert_eq!(filter.dir_in_scope(&root.join("src"), root), Ok(()));
            assert_eq!(
                filter.dir_in_scope(&root.join("dist"), root),
                Err(Rejection::Excluded)
            );
            assert_eq!(
                filter.dir_in_scope(&root.join(".venv"), root),
                Err(Rejection::Hidden)
            );
        }
        config.files.insert(PathBuf::from("/work/src/core"));
        let filter = PathFilter::new(&config, &registry);
        assert_eq!(filter.dir_in_scope(&root.join("src"), root), Ok(()));
        assert_eq!(filter.dir_in_scope(&root.join("src/core/x"), root), Ok(()));
        assert_eq!(
            filter.dir_in_scope(&root.join("docs"), root),
            Err(Rejection::NotListed)
        );
    }

    #[test]
    fn test_root_file_checks_basename_only() {
        let config = Configuration::default();
        let registry = LanguageRegistry::builtin();
        let filter = PathFilter::new(&config, &registry);
        let file = Path::new("/tmp/build/script.py");
        assert!(filter.check(file, file).is_ok());
    }

    #[test]
    fn test_shebang_classifies_extensionless_script() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let script = temp_dir.path().join("deploy");
        fs::write(&script, "#!/usr/bin/env python3\nprint('hi')\n")?;
        let plain = temp_dir.path().join("LICENSE");
        fs::write(&plain, "Permission is hereby granted\n")?;

        let config = Configuration::default();
        let registry = LanguageRegistry::builtin();
        let filter = PathFilter::new(&config, &registry);
        assert_eq!(
            filter.check(&script, temp_dir.path()).map(|l| l.name.as_str()),
            Ok("Python")
        );
        assert_eq!(
            filter.check(&plain, temp_dir.path()).map(|l| l.name.as_str()),
            Err(Rejection::UnknownLanguage)
        );
        Ok(())
    }
}
