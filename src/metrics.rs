use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::debug;

/// Counters shared by the counting workers. Only used for diagnostics: the
/// report is built from the records themselves.
#[derive(Debug)]
pub struct RunMetrics {
    files_processed: AtomicU64,
    lines_processed: AtomicU64,
    files_skipped: AtomicU64,
    start_time: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        RunMetrics::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        RunMetrics {
            files_processed: AtomicU64::new(0),
            lines_processed: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_file(&self, lines: u64) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.lines_processed.fetch_add(lines, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }

    pub fn lines_processed(&self) -> u64 {
        self.lines_processed.load(Ordering::Relaxed)
    }

    pub fn files_skipped(&self) -> u64 {
        self.files_skipped.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let files = self.files_processed();
        let lines = self.lines_processed();
        debug!(
            "counted {} files ({:.1} files/sec) and {} lines ({:.1} lines/sec) in {:.3} sec, {} skipped",
            files,
            safe_rate(files, elapsed),
            lines,
            safe_rate(lines, elapsed),
            elapsed,
            self.files_skipped()
        );
    }
}

fn safe_rate(value: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= f64::EPSILON {
        0.0
    } else {
        value as f64 / elapsed_secs
    }
}
