use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::counter::{FileCounter, FileRecord};
use crate::error::{RootResolutionError, Skip, SkipReason};
use crate::filter::PathFilter;
use crate::languages::LanguageDescriptor;

/// A file that passed the filter, with its detected language.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub path: PathBuf,
    pub language: &'a LanguageDescriptor,
}

#[derive(Debug, Clone)]
pub enum Discovered<'a> {
    File(Candidate<'a>),
    Skip(Skip),
}

/// Depth-first walk over every root, directory entries in file name order.
///
/// Symbolic links are never followed; each one is reported as a skip.
/// Directories rejected by the filter are pruned before they are listed.
/// The walk is lazy and single-pass: walking again needs a new walker.
pub struct TreeWalker<'a> {
    filter: PathFilter<'a>,
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, walkdir::IntoIter)>,
}

impl<'a> TreeWalker<'a> {
    /// Resolve every configured root. A root that cannot be resolved aborts
    /// the whole run.
    pub fn new(filter: PathFilter<'a>) -> Result<Self, RootResolutionError> {
        let config = filter.config();
        let roots = resolve_roots(&config.roots, &config.files)?;
        Ok(TreeWalker {
            filter,
            roots: roots.into_iter(),
            current: None,
        })
    }
}

/// Canonical roots in the given order. Listed files or folders outside
/// every root become roots of their own. A root inside another root is
/// dropped, so no file is walked twice.
pub fn resolve_roots(
    roots: &[PathBuf],
    files: &BTreeSet<PathBuf>,
) -> Result<Vec<PathBuf>, RootResolutionError> {
    let mut resolved: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        resolved.push(canonical_root(root)?);
    }
    let mut extra = Vec::new();
    for member in files {
        let related = resolved
            .iter()
            .any(|root| member.starts_with(root) || root.starts_with(member));
        if !related {
            debug!("walking listed path {} outside the roots", member.display());
            extra.push(canonical_root(member)?);
        }
    }
    resolved.extend(extra);

    let mut kept: Vec<PathBuf> = Vec::with_capacity(resolved.len());
    for root in &resolved {
        let nested = resolved
            .iter()
            .any(|other| other != root && root.starts_with(other));
        if !nested && !kept.contains(root) {
            kept.push(root.clone());
        }
    }
    Ok(kept)
}

fn canonical_root(path: &Path) -> Result<PathBuf, RootResolutionError> {
    fs::canonicalize(path).map_err(|source| RootResolutionError {
        path: path.to_path_buf(),
        source,
    })
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = Discovered<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let root = self.roots.next()?;
                debug!("walking {}", root.display());
                let iter = WalkDir::new(&root)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter();
                self.current = Some((root, iter));
            }
            let (root, iter) = self.current.as_mut()?;

            let entry = match iter.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(err)) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    let reason = match err.io_error() {
                        Some(io_err) => SkipReason::Unlisted(io_err.to_string()),
                        None => SkipReason::Unlisted(err.to_string()),
                    };
                    return Some(Discovered::Skip(Skip::new(path, reason)));
                }
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                if self.filter.dir_in_scope(path, root).is_ok() {
                    return Some(Discovered::Skip(Skip::new(path, SkipReason::Symlink)));
                }
                continue;
            }
            if file_type.is_dir() {
                if let Err(rejection) = self.filter.dir_in_scope(path, root) {
                    trace!("pruning {}: {}", path.display(), rejection);
                    iter.skip_current_dir();
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            match self.filter.check(path, root) {
                Ok(language) => {
                    return Some(Discovered::File(Candidate {
                        path: entry.into_path(),
                        language,
                    }))
                }
                Err(rejection) => trace!("ignoring {}: {}", path.display(), rejection),
            }
        }
    }
}

/// Lazily counts every candidate of a walk on the calling thread.
pub struct Walk<'a> {
    walker: TreeWalker<'a>,
    counter: FileCounter,
}

impl<'a> Iterator for Walk<'a> {
    type Item = Result<FileRecord, Skip>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.walker.next()? {
            Discovered::File(candidate) => count_candidate(&self.counter, candidate),
            Discovered::Skip(skip) => Err(skip),
        })
    }
}

pub fn walk<'a>(
    filter: PathFilter<'a>,
    counter: FileCounter,
) -> Result<Walk<'a>, RootResolutionError> {
    Ok(Walk {
        walker: TreeWalker::new(filter)?,
        counter,
    })
}

pub fn count_candidate(
    counter: &FileCounter,
    candidate: Candidate<'_>,
) -> Result<FileRecord, Skip> {
    counter
        .count(&candidate.path, candidate.language)
        .map_err(|err| Skip::from_count_error(candidate.path, err))
}
