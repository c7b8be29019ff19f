//! Language descriptors and the registry that maps file names to them.
//!
//! Languages are plain data: the extensions and file names that identify
//! them plus their comment syntax. The registry is built once at start-up
//! (built-ins plus any `clc.dat` definitions) and only read afterwards.

use std::collections::HashMap;
use std::env;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub const LANGUAGE_FILE_NAME: &str = "clc.dat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDescriptor {
    /// Short identifier used on the command line, e.g. `py`.
    pub key: String,
    /// Display name, unique across the registry, e.g. `Python`.
    pub name: String,
    /// Lower-case extensions without the leading dot.
    pub extensions: Vec<String>,
    /// Lower-case exact file names, e.g. `makefile`.
    pub filenames: Vec<String>,
    pub line_comments: Vec<String>,
    pub block_comments: Vec<(String, String)>,
    /// Interpreter names recognised in a `#!` line.
    pub shebangs: Vec<String>,
}

impl LanguageDescriptor {
    pub fn new(key: &str, name: &str, extensions: &[&str]) -> Self {
        LanguageDescriptor {
            key: key.to_string(),
            name: name.to_string(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            filenames: Vec::new(),
            line_comments: Vec::new(),
            block_comments: Vec::new(),
            shebangs: Vec::new(),
        }
    }

    fn filenames(mut self, names: &[&str]) -> Self {
        self.filenames = names.iter().map(|n| n.to_lowercase()).collect();
        self
    }

    fn line_comments(mut self, markers: &[&str]) -> Self {
        self.line_comments = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    fn block_comments(mut self, pairs: &[(&str, &str)]) -> Self {
        self.block_comments = pairs
            .iter()
            .map(|(open, close)| (open.to_string(), close.to_string()))
            .collect();
        self
    }

    fn shebangs(mut self, interpreters: &[&str]) -> Self {
        self.shebangs = interpreters.iter().map(|i| i.to_string()).collect();
        self
    }

    pub fn has_comment_syntax(&self) -> bool {
        !self.line_comments.is_empty() || !self.block_comments.is_empty()
    }
}

const C_BLOCK: &[(&str, &str)] = &[("/*", "*/")];

fn builtin_languages() -> Vec<LanguageDescriptor> {
    vec![
        LanguageDescriptor::new("c", "C", &["c", "h"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("cpp", "C++", &["cpp", "cxx", "cc", "hpp", "hxx", "hh"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("cs", "C#", &["cs"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("d", "D", &["d"])
            .line_comments(&["//"])
            .block_comments(&[("/*", "*/"), ("/+", "+/")]),
        LanguageDescriptor::new("go", "Go", &["go"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("java", "Java", &["java"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("js", "JavaScript", &["js", "mjs", "cjs", "jsx"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK)
            .shebangs(&["node"]),
        LanguageDescriptor::new("jl", "Julia", &["jl"])
            .line_comments(&["#"])
            .block_comments(&[("#=", "=#")])
            .shebangs(&["julia"]),
        LanguageDescriptor::new("make", "Makefile", &["mk", "mak"])
            .filenames(&["makefile", "gnumakefile", "bsdmakefile"])
            .line_comments(&["#"]),
        LanguageDescriptor::new("nim", "Nim", &["nim"])
            .line_comments(&["#"])
            .block_comments(&[("#[", "]#")]),
        LanguageDescriptor::new("pl", "Perl", &["pl", "pm", "t"])
            .line_comments(&["#"])
            .block_comments(&[("=pod", "=cut")])
            .shebangs(&["perl"]),
        LanguageDescriptor::new("php", "PHP", &["php"])
            .line_comments(&["//", "#"])
            .block_comments(C_BLOCK)
            .shebangs(&["php"]),
        LanguageDescriptor::new("py", "Python", &["py", "pyw"])
            .line_comments(&["#"])
            .block_comments(&[("\"\"\"", "\"\"\""), ("'''", "'''")])
            .shebangs(&["python"]),
        LanguageDescriptor::new("rb", "Ruby", &["rb"])
            .filenames(&["rakefile", "gemfile"])
            .line_comments(&["#"])
            .block_comments(&[("=begin", "=end")])
            .shebangs(&["ruby"]),
        LanguageDescriptor::new("rs", "Rust", &["rs"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("sh", "Shell", &["sh", "bash", "zsh", "ksh"])
            .line_comments(&["#"])
            .shebangs(&["sh", "bash", "zsh", "ksh", "dash"]),
        LanguageDescriptor::new("tcl", "Tcl", &["tcl"])
            .line_comments(&["#"])
            .shebangs(&["tclsh", "wish"]),
        LanguageDescriptor::new("ts", "TypeScript", &["ts", "tsx", "mts", "cts"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
        LanguageDescriptor::new("vala", "Vala", &["vala"])
            .line_comments(&["//"])
            .block_comments(C_BLOCK),
    ]
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDescriptor>,
    by_filename: HashMap<String, usize>,
    by_extension: HashMap<String, usize>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        LanguageRegistry::builtin()
    }
}

impl LanguageRegistry {
    pub fn builtin() -> Self {
        LanguageRegistry::from_descriptors(builtin_languages())
    }

    pub fn from_descriptors(languages: Vec<LanguageDescriptor>) -> Self {
        let mut by_filename = HashMap::new();
        let mut by_extension = HashMap::new();
        // Later descriptors win when two claim the same name or extension.
        for (idx, lang) in languages.iter().enumerate() {
            for name in &lang.filenames {
                by_filename.insert(name.clone(), idx);
            }
            for ext in &lang.extensions {
                by_extension.insert(ext.clone(), idx);
            }
        }
        LanguageRegistry {
            languages,
            by_filename,
            by_extension,
        }
    }

    /// Adds user-defined languages; one whose key matches an existing
    /// language replaces it.
    pub fn with_user_languages(self, defs: Vec<LanguageDescriptor>) -> Self {
        if defs.is_empty() {
            return self;
        }
        let mut languages = self.languages;
        for def in defs {
            match languages
                .iter_mut()
                .find(|lang| lang.key.eq_ignore_ascii_case(&def.key))
            {
                Some(existing) => *existing = def,
                None => languages.push(def),
            }
        }
        LanguageRegistry::from_descriptors(languages)
    }

    /// Identify the language of `path` by exact file name, then by
    /// extension. Both comparisons are case-insensitive.
    pub fn classify(&self, path: &Path) -> Option<&LanguageDescriptor> {
        let file_name = path.file_name()?.to_str()?.to_lowercase();
        if let Some(&idx) = self.by_filename.get(&file_name) {
            return Some(&self.languages[idx]);
        }
        let ext = Path::new(&file_name).extension()?.to_str()?;
        self.by_extension
            .get(ext)
            .map(|&idx| &self.languages[idx])
    }

    /// Identify a script by its `#!` line, e.g. `#!/usr/bin/env python3`.
    pub fn classify_shebang(&self, first_line: &str) -> Option<&LanguageDescriptor> {
        let interpreter = shebang_interpreter(first_line)?;
        self.languages.iter().find(|lang| {
            lang.shebangs.iter().any(|name| {
                interpreter
                    .strip_prefix(name.as_str())
                    .map(|rest| rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
                    .unwrap_or(false)
            })
        })
    }

    /// Case-insensitive lookup by key (`py`) or display name (`Python`).
    pub fn lookup(&self, name: &str) -> Option<&LanguageDescriptor> {
        self.languages.iter().find(|lang| {
            lang.key.eq_ignore_ascii_case(name) || lang.name.eq_ignore_ascii_case(name)
        })
    }

    /// All languages ordered by display name.
    pub fn iter(&self) -> impl Iterator<Item = &LanguageDescriptor> {
        let mut sorted: Vec<&LanguageDescriptor> = self.languages.iter().collect();
        sorted.sort_by_key(|lang| lang.name.to_lowercase());
        sorted.into_iter()
    }

    pub fn listing(&self) -> String {
        let key_width = self.languages.iter().map(|l| l.key.len()).max().unwrap_or(0);
        let name_width = self.languages.iter().map(|l| l.name.len()).max().unwrap_or(0);
        let mut out = String::from("Supported languages:\n");
        for lang in self.iter() {
            let mut matches: Vec<String> =
                lang.extensions.iter().map(|ext| format!(".{ext}")).collect();
            matches.extend(lang.filenames.iter().cloned());
            let _ = writeln!(
                out,
                "  {:<key_width$}  {:<name_width$}  {}",
                lang.key,
                lang.name,
                matches.join(" ")
            );
        }
        out
    }
}

fn shebang_interpreter(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#!")?;
    let mut words = rest.split_whitespace();
    let program = words.next()?;
    let program = program.rsplit('/').next().unwrap_or(program);
    if program == "env" {
        words.find(|w| !w.starts_with('-') && !w.contains('='))
    } else {
        Some(program)
    }
}

/// Parse the `key|Name|ext1 ext2 ...` lines of a language definition file.
/// Blank lines and `#` comments are skipped; malformed lines are reported
/// and ignored.
pub fn parse_language_defs(text: &str, source: &Path) -> Vec<LanguageDescriptor> {
    let mut defs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.splitn(3, '|').map(str::trim).collect();
        match parts.as_slice() {
            [key, name, exts] if !key.is_empty() && !name.is_empty() => {
                let exts: Vec<&str> = exts.split_whitespace().collect();
                defs.push(LanguageDescriptor::new(key, name, &exts));
            }
            _ => warn!("ignoring invalid line from {}: {}", source.display(), line),
        }
    }
    defs
}

/// The locations searched for language definition files, in load order.
pub fn default_language_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        files.push(dir.join(LANGUAGE_FILE_NAME));
    }
    if let Some(home) = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE")) {
        let home = PathBuf::from(home);
        files.push(home.join(LANGUAGE_FILE_NAME));
        files.push(home.join(".config").join(LANGUAGE_FILE_NAME));
    }
    if let Ok(cwd) = env::current_dir() {
        files.push(cwd.join(LANGUAGE_FILE_NAME));
    }
    files
}

/// Load every readable definition file; missing files are not an error.
pub fn load_language_files(paths: &[PathBuf]) -> Vec<LanguageDescriptor> {
    let mut defs = Vec::new();
    for path in paths {
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!("reading language definitions from {}", path.display());
                defs.extend(parse_language_defs(&text, path));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("cannot read {}: {}", path.display(), err),
        }
    }
    defs
}
