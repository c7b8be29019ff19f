//! Dispatching file counting over a bounded worker pool.
//!
//! The directory walk runs on one coordinating thread and feeds a bounded
//! channel; a rayon pool of `jobs` threads counts one file per task. The
//! results are gathered into a single [`Tally`] and folded afterwards, so
//! completion order never leaks into the report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rayon::prelude::*;
use tracing::info;

use crate::counter::{FileCounter, FileRecord};
use crate::error::{ClcError, Skip};
use crate::filter::PathFilter;
use crate::metrics::RunMetrics;
use crate::walker::{count_candidate, walk, Discovered, TreeWalker, Walk};

/// Everything a run produced, in no particular order.
#[derive(Debug, Default)]
pub struct Tally {
    pub records: Vec<FileRecord>,
    pub skips: Vec<Skip>,
}

impl Tally {
    fn push(&mut self, outcome: Result<FileRecord, Skip>, metrics: &RunMetrics) {
        match outcome {
            Ok(record) => {
                metrics.record_file(record.total);
                self.records.push(record);
            }
            Err(skip) => {
                info!("skipped {}: {}", skip.path.display(), skip.reason);
                metrics.record_skip();
                self.skips.push(skip);
            }
        }
    }
}

/// Walk and count everything the filter accepts, on `jobs` threads.
pub fn count_files(
    filter: PathFilter<'_>,
    counter: FileCounter,
    jobs: usize,
    cancel: &AtomicBool,
    metrics: &RunMetrics,
) -> Result<Tally, ClcError> {
    if jobs <= 1 {
        count_sequential(walk(filter, counter)?, cancel, metrics)
    } else {
        count_parallel(TreeWalker::new(filter)?, counter, jobs, cancel, metrics)
    }
}

pub fn count_sequential(
    outcomes: Walk<'_>,
    cancel: &AtomicBool,
    metrics: &RunMetrics,
) -> Result<Tally, ClcError> {
    let mut tally = Tally::default();
    for outcome in outcomes {
        if cancel.load(Ordering::Relaxed) {
            return Err(ClcError::Cancelled);
        }
        tally.push(outcome, metrics);
    }
    Ok(tally)
}

pub fn count_parallel(
    walker: TreeWalker<'_>,
    counter: FileCounter,
    jobs: usize,
    cancel: &AtomicBool,
    metrics: &RunMetrics,
) -> Result<Tally, ClcError> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let (tx, rx) = crossbeam_channel::bounded::<Discovered<'_>>(jobs * 4);

    let outcomes: Vec<Option<Result<FileRecord, Skip>>> = thread::scope(|scope| {
        scope.spawn(move || {
            for item in walker {
                if cancel.load(Ordering::Relaxed) || tx.send(item).is_err() {
                    break;
                }
            }
        });
        pool.install(|| {
            rx.into_iter()
                .par_bridge()
                .map(|item| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    Some(match item {
                        Discovered::File(candidate) => count_candidate(&counter, candidate),
                        Discovered::Skip(skip) => Err(skip),
                    })
                })
                .collect::<Vec<_>>()
        })
    });

    if cancel.load(Ordering::Relaxed) {
        return Err(ClcError::Cancelled);
    }
    let mut tally = Tally::default();
    for outcome in outcomes.into_iter().flatten() {
        tally.push(outcome, metrics);
    }
    Ok(tally)
}
