use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or mutually exclusive options. Raised before any traversal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("language '{0}' is both counted (-l) and skipped (-L)")]
    Conflict(String),

    #[error("unknown language '{0}' (see --list-languages)")]
    UnknownLanguage(String),

    #[error("invalid include pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("the number of jobs must be at least 1")]
    ZeroJobs,
}

/// A root path that does not exist or cannot be resolved.
#[derive(Debug, Error)]
#[error("Path does not exist or is not accessible: {}: {source}", path.display())]
pub struct RootResolutionError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Why a single file was not counted.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("binary content")]
    Binary,

    #[error("{0}")]
    Read(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Binary,
    Symlink,
    Unreadable(String),
    Unlisted(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Binary => write!(f, "binary file"),
            SkipReason::Symlink => write!(f, "symbolic link"),
            SkipReason::Unreadable(err) => write!(f, "unreadable: {err}"),
            SkipReason::Unlisted(err) => write!(f, "cannot list: {err}"),
        }
    }
}

/// A non-fatal exclusion recorded during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl Skip {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Skip {
            path: path.into(),
            reason,
        }
    }

    pub fn from_count_error(path: impl Into<PathBuf>, err: CountError) -> Self {
        let reason = match err {
            CountError::Binary => SkipReason::Binary,
            CountError::Read(err) => SkipReason::Unreadable(err.to_string()),
        };
        Skip::new(path, reason)
    }
}

/// Fatal errors that end the run before a report is produced.
#[derive(Debug, Error)]
pub enum ClcError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Root(#[from] RootResolutionError),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("interrupted")]
    Cancelled,
}

impl ClcError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ClcError::Cancelled => 130,
            _ => 1,
        }
    }
}
