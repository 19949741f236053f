use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;

use crate::fingerprint_error::{ExitCode, FingerprintError};

/// wall clock measurement of a piece of work
pub struct TimeMeasure {
    start: Instant,
}

impl TimeMeasure {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Counters gathered by the workers of a build and merged by the caller.
#[derive(Default, Debug, Clone)]
pub struct Metrics {
    warnings: HashMap<ExitCode, usize>,
    skipped: HashMap<ExitCode, usize>,
    bytes_read: u64,
    stopped_early: usize,
    worker_time: Duration,
}

impl Metrics {
    pub fn record_warning(&mut self, code: ExitCode) {
        *self.warnings.entry(code).or_insert(0) += 1;
    }

    pub fn record_skip(&mut self, code: ExitCode) {
        *self.skipped.entry(code).or_insert(0) += 1;
    }

    pub fn record_file(&mut self, bytes: u64, stopped_early: bool) {
        self.bytes_read += bytes;
        if stopped_early {
            self.stopped_early += 1;
        }
    }

    pub fn record_worker_time(&mut self, duration: Duration) {
        self.worker_time += duration;
    }

    pub fn get_worker_time(&self) -> Duration {
        self.worker_time
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn warning_count(&self, code: ExitCode) -> usize {
        self.warnings.get(&code).copied().unwrap_or(0)
    }

    pub fn skip_count(&self, code: ExitCode) -> usize {
        self.skipped.get(&code).copied().unwrap_or(0)
    }

    pub fn merge_from(&mut self, source_metrics: Metrics) {
        for (code, n) in source_metrics.warnings {
            *self.warnings.entry(code).or_insert(0) += n;
        }
        for (code, n) in source_metrics.skipped {
            *self.skipped.entry(code).or_insert(0) += n;
        }

        self.bytes_read += source_metrics.bytes_read;
        self.stopped_early += source_metrics.stopped_early;
        self.worker_time += source_metrics.worker_time;
    }

    pub fn log_metrics(&self) {
        let mut sort_vec: Vec<_> = self.warnings.iter().collect();
        sort_vec.sort_by_key(|x| x.0.as_integer_error_code());
        for (code, n) in sort_vec {
            info!("warnings {0:16} {1}", code, n);
        }

        let mut sort_vec: Vec<_> = self.skipped.iter().collect();
        sort_vec.sort_by_key(|x| x.0.as_integer_error_code());
        for (code, n) in sort_vec {
            info!("skipped  {0:16} {1}", code, n);
        }

        info!(
            "read={0} bytes stopped_early={1} worker={2}ms",
            self.bytes_read,
            self.stopped_early,
            self.worker_time.as_millis()
        );
    }
}

/// A file that could not be turned into a record.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub exit_code: ExitCode,
    pub message: String,
}

impl SkippedItem {
    pub fn new(path: PathBuf, e: &FingerprintError) -> Self {
        SkippedItem {
            path,
            exit_code: e.exit_code(),
            message: e.message().to_owned(),
        }
    }
}

/// Outcome of a database build besides the database itself.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// number of records written
    pub processed: usize,
    pub skipped: Vec<SkippedItem>,
    pub elapsed: Duration,
    pub metrics: Metrics,
}

#[test]
fn merge_adds_counters() {
    let mut a = Metrics::default();
    a.record_warning(ExitCode::TruncatedTable);
    a.record_file(100, true);
    a.record_worker_time(Duration::from_millis(5));

    let mut b = Metrics::default();
    b.record_warning(ExitCode::TruncatedTable);
    b.record_warning(ExitCode::MalformedSegment);
    b.record_skip(ExitCode::NotJpeg);
    b.record_file(50, false);
    b.record_worker_time(Duration::from_millis(7));

    a.merge_from(b);
    assert_eq!(a.warning_count(ExitCode::TruncatedTable), 2);
    assert_eq!(a.warning_count(ExitCode::MalformedSegment), 1);
    assert_eq!(a.skip_count(ExitCode::NotJpeg), 1);
    assert_eq!(a.skip_count(ExitCode::OsError), 0);
    assert_eq!(a.get_bytes_read(), 150);
    assert_eq!(a.get_worker_time(), Duration::from_millis(12));
}
