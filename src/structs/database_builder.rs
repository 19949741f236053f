/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, LazyLock, Mutex};

use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::consts::{MAX_INFERRED_QUALITY, MIN_INFERRED_QUALITY};
use crate::fingerprint_error::{err_exit_code, AddContext, ExitCode, FingerprintError, Result};
use crate::helpers::catch_unwind_result;
use crate::jpeg::JpegMeta;
use crate::metrics::{BuildReport, Metrics, SkippedItem, TimeMeasure};
use crate::options::{BuildOptions, ParseOptions};

use super::database::{DatabaseRecord, QuantDatabase};
use super::fingerprint::FileFingerprint;
use super::simple_threadpool::FingerprintThreadPool;

static QUALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("quality pattern is a valid regex"));

/// Best effort quality from a file name: the first run of digits, if it lies in 0..=1000.
///
/// `"90.jpg"` and `"quality_95.jpg"` give 90 and 95, `"x.jpg"` gives nothing.
pub fn infer_quality_from_filename(name: &str) -> Option<u32> {
    let digits = QUALITY_RE.find(name)?;
    let q: u32 = digits.as_str().parse().ok()?;
    if (MIN_INFERRED_QUALITY..=MAX_INFERRED_QUALITY).contains(&q) {
        Some(q)
    } else {
        None
    }
}

/// A file waiting to be fingerprinted, `index` is its position in the final database.
#[derive(Debug, Clone)]
struct BuildJob {
    index: usize,
    software: String,
    path: PathBuf,
}

type JobOutcome = Result<(DatabaseRecord, Metrics)>;

/// Lists `<root>/<software>/<file>` in a stable order: label directories by name,
/// then files by path.
fn collect_jobs(
    dataset_root: &Path,
    options: &BuildOptions,
    skipped: &mut Vec<SkippedItem>,
) -> Result<Vec<BuildJob>> {
    if !dataset_root.is_dir() {
        return err_exit_code(
            ExitCode::FileNotFound,
            format!("dataset not found: {0}", dataset_root.display()),
        );
    }

    let mut jobs = Vec::new();

    let labels = WalkDir::new(dataset_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for label_dir in labels {
        let label_dir = label_dir.context()?;
        if !label_dir.file_type().is_dir() {
            continue;
        }

        let software = label_dir.file_name().to_string_lossy().into_owned();
        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let before = jobs.len();

        let files = WalkDir::new(label_dir.path())
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .sort_by_file_name();

        for entry in files {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let e = FingerprintError::from(e);
                    warn!("skipping {0}: {1}", path.display(), e);
                    skipped.push(SkippedItem::new(path, &e));
                    continue;
                }
            };

            if entry.file_type().is_file() && options.accepts_extension(entry.path()) {
                jobs.push(BuildJob {
                    index: jobs.len(),
                    software: software.clone(),
                    path: entry.into_path(),
                });
            }
        }

        info!("[{0}] {1} files", software, jobs.len() - before);
    }

    Ok(jobs)
}

/// Fingerprints one file and assembles its record.
fn process_job(job: &BuildJob, options: &ParseOptions) -> JobOutcome {
    let time = TimeMeasure::new();
    let file = FileFingerprint::from_path(&job.path, options)?;

    if !file.header.is_jpeg {
        return err_exit_code(
            ExitCode::NotJpeg,
            format!("{0} is not a JPEG", job.path.display()),
        );
    }

    let mut metrics = Metrics::default();
    for w in &file.header.warnings {
        metrics.record_warning(w.exit_code());
    }

    let filename = job
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    let path = std::fs::canonicalize(&job.path).unwrap_or_else(|_| job.path.clone());

    let record = DatabaseRecord {
        software: job.software.clone(),
        quality: infer_quality_from_filename(&filename),
        filename,
        path: path.to_string_lossy().into_owned(),
        sha256: file.sha256,
        qtables: file.qtables,
        qhash: file.fingerprint,
        jpeg_meta: JpegMeta::from(file.header.frame.as_ref()),
    };

    let size = std::fs::metadata(&job.path).map(|m| m.len()).unwrap_or(0);
    metrics.record_file(size, file.header.stopped_early);
    metrics.record_worker_time(time.elapsed());

    debug!("{0}: {1:?}", job.path.display(), record.qhash);
    Ok((record, metrics))
}

/// Runs the jobs on `workers` closures submitted to the pool. Each worker pulls jobs from a
/// shared queue until it is empty and sends every outcome back over a channel, the only
/// point where workers synchronize with the caller.
fn run_parallel(
    jobs: Vec<BuildJob>,
    workers: usize,
    options: &ParseOptions,
    pool: &dyn FingerprintThreadPool,
) -> Result<Vec<(BuildJob, JobOutcome)>> {
    let total = jobs.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let (tx, rx) = channel();

    for _ in 0..workers {
        let queue = queue.clone();
        let tx = tx.clone();
        let options = options.clone();

        pool.run(Box::new(move || loop {
            let job = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(_) => None,
            };

            let Some(job) = job else { break };

            let outcome = catch_unwind_result(|| process_job(&job, &options));
            if tx.send((job, outcome)).is_err() {
                break;
            }
        }));
    }

    // only the workers hold senders now, the loop ends when they all finished
    drop(tx);

    let mut results: Vec<(BuildJob, JobOutcome)> = rx.iter().collect();
    if results.len() != total {
        return err_exit_code(
            ExitCode::ChannelFailure,
            format!("expected {0} results from workers, got {1}", total, results.len()),
        );
    }

    results.sort_by_key(|r| r.0.index);
    Ok(results)
}

/// Builds a database from `dataset_root/<software>/*.jpg` using the default thread pool.
pub fn build_database(
    dataset_root: &Path,
    options: &BuildOptions,
) -> Result<(QuantDatabase, BuildReport)> {
    #[cfg(feature = "use_rayon")]
    let pool: &dyn FingerprintThreadPool = &super::simple_threadpool::RayonThreadPool {};
    #[cfg(not(feature = "use_rayon"))]
    let pool: &dyn FingerprintThreadPool = &super::simple_threadpool::DEFAULT_THREAD_POOL;

    build_database_with_pool(dataset_root, options, pool)
}

/// Builds a database, running the extraction on the given pool when more than one worker
/// is requested.
///
/// A missing dataset directory fails the whole build before anything is read. Files that
/// can't be read or aren't JPEGs are reported in the `BuildReport` and left out.
pub fn build_database_with_pool(
    dataset_root: &Path,
    options: &BuildOptions,
    pool: &dyn FingerprintThreadPool,
) -> Result<(QuantDatabase, BuildReport)> {
    let time = TimeMeasure::new();
    let mut report = BuildReport::default();

    let jobs = collect_jobs(dataset_root, options, &mut report.skipped)?;
    let root = std::fs::canonicalize(dataset_root).context()?;
    let mut db = QuantDatabase::new(root.to_string_lossy());

    let workers = options.workers.min(jobs.len());
    info!(
        "fingerprinting {0} files with {1} workers",
        jobs.len(),
        workers.max(1)
    );

    let results: Vec<(BuildJob, JobOutcome)> = if workers <= 1 {
        jobs.into_iter()
            .map(|job| {
                let outcome = catch_unwind_result(|| process_job(&job, &options.parse));
                (job, outcome)
            })
            .collect()
    } else {
        run_parallel(jobs, workers, &options.parse, pool)?
    };

    for (job, outcome) in results {
        match outcome {
            Ok((record, metrics)) => {
                report.metrics.merge_from(metrics);
                db.items.push(record);
            }
            Err(e) => {
                warn!("skipping {0}: {1}", job.path.display(), e);
                report.metrics.record_skip(e.exit_code());
                report.skipped.push(SkippedItem::new(job.path, &e));
            }
        }
    }

    report.processed = db.items.len();
    report.elapsed = time.elapsed();

    info!(
        "built database with {0} records, {1} skipped in {2}ms",
        report.processed,
        report.skipped.len(),
        report.elapsed.as_millis()
    );
    report.metrics.log_metrics();

    Ok((db, report))
}
