use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{
    absolute_path, compile_includes, default_excludes, resolve_languages, Configuration,
};
use crate::error::ConfigError;
use crate::languages::LanguageRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "clc",
    author,
    version,
    about = "Counts the lines in source code files, broken down by language",
    long_about = "Counts total and non-blank lines of source files below each PATH, grouped by \
                  language. Extra languages can be defined in clc.dat files; run with \
                  --list-languages to see the known ones."
)]
pub struct Args {
    /// Files or folders to count [default: the listed files, or .]
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Only count these languages (key or name)
    #[arg(
        short = 'l',
        long = "language",
        value_name = "LANG",
        num_args = 1..,
        value_delimiter = ',',
        action = ArgAction::Append
    )]
    pub languages: Vec<String>,

    /// Never count these languages
    #[arg(
        short = 'L',
        long = "skiplanguage",
        value_name = "LANG",
        num_args = 1..,
        value_delimiter = ',',
        action = ArgAction::Append
    )]
    pub skip_languages: Vec<String>,

    /// Extra file or folder names to leave out, on top of the defaults
    #[arg(short, long, value_name = "NAME", num_args = 1.., action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Only count files whose name matches one of these globs
    #[arg(short, long, value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    pub include: Vec<String>,

    /// Flag files with lines wider than N characters (0 disables)
    #[arg(short, long = "maxwidth", value_name = "N", default_value_t = 0)]
    pub max_width: usize,

    /// Sort by line count instead of name
    #[arg(short, long = "sortbylines")]
    pub sort_by_lines: bool,

    /// Only print the per-language summary
    #[arg(short = 'S', long)]
    pub summary: bool,

    /// Restrict counting to these files or folders
    #[arg(short, long = "file", value_name = "PATH", num_args = 1.., action = ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Also count comment lines
    #[arg(short, long)]
    pub comments: bool,

    /// Number of counting threads (defaults to the number of CPUs)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Log skipped files to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Never colour the output
    #[arg(long)]
    pub no_color: bool,

    /// Print the known languages and exit
    #[arg(long)]
    pub list_languages: bool,
}

impl Args {
    /// Resolve names and patterns against the registry. The result is not
    /// yet validated.
    pub fn into_configuration(
        self,
        registry: &LanguageRegistry,
    ) -> Result<Configuration, ConfigError> {
        let defaults = Configuration::default();
        let mut excludes = default_excludes();
        excludes.extend(self.exclude);
        let files: BTreeSet<PathBuf> = self.files.iter().map(|f| absolute_path(f)).collect();
        let roots = if !self.paths.is_empty() {
            self.paths
        } else if !files.is_empty() {
            files.iter().cloned().collect()
        } else {
            defaults.roots.clone()
        };
        Ok(Configuration {
            roots,
            languages: resolve_languages(&self.languages, registry)?,
            skip_languages: resolve_languages(&self.skip_languages, registry)?,
            excludes,
            includes: compile_includes(&self.include)?,
            max_width: self.max_width,
            sort_by_lines: self.sort_by_lines,
            summary: self.summary,
            files,
            comments: self.comments,
            jobs: self.jobs.unwrap_or(defaults.jobs),
        })
    }
}
