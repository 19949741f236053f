/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#![doc = include_str!("../README.md")]
// Don't allow any unsafe code by default. Since this code has to potentially deal with
// badly/maliciously formatted images, we want this extra level of safety.
#![forbid(unsafe_code)]
#![forbid(trivial_casts)]
#![forbid(non_ascii_idents)]
#![deny(unused_extern_crates)]
#![forbid(unused_import_braces)]
#![forbid(macro_use_extern_crate)]

mod consts;
mod helpers;
mod metrics;
mod options;
mod structs;

pub mod fingerprint_error;
pub mod jpeg;

use std::path::Path;

pub use consts::{DATABASE_SCHEMA, MATCH_NOTES, NOT_JPEG_NOTE};
pub use fingerprint_error::{ExitCode, FingerprintError, Result};
pub use helpers::catch_unwind_result;
pub use metrics::{BuildReport, Metrics, SkippedItem, TimeMeasure};
pub use options::{BuildOptions, MatchOptions, ParseOptions};

pub use jpeg::jpeg_header::JpegHeader;
pub use structs::database::{DatabaseRecord, QuantDatabase};
pub use structs::database_builder::{
    build_database, build_database_with_pool, infer_quality_from_filename,
};
pub use structs::fingerprint::{
    canonical_form, table_digest, FileFingerprint, Fingerprint, QTables,
};
pub use structs::matcher::{
    compare_hits, match_bytes, match_file, match_fingerprint, score_record, MatchHit, MatchInput,
    MatchResult,
};
pub use structs::report::{
    compare_by_quality, inspect_file, summarize_database, HeaderInspection, QualityComparison,
    RoleChoice, SoftwareSummary,
};
#[cfg(feature = "use_rayon")]
pub use structs::simple_threadpool::RayonThreadPool;
pub use structs::simple_threadpool::{FingerprintThreadPool, SimpleThreadPool, DEFAULT_THREAD_POOL};

static GIT_VERSION: &str = git_version::git_version!(
    args = ["--abbrev=40", "--always", "--dirty=M"],
    fallback = "0"
);

static PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version string of the library, which includes the package version and the git version.
pub fn get_version_string() -> String {
    format!("{}-{}", PACKAGE_VERSION, GIT_VERSION)
}

/// Fingerprints a single file: reads it, parses its header and digests the luma and
/// chroma tables.
pub fn fingerprint_file(path: &Path, options: &ParseOptions) -> Result<FileFingerprint> {
    FileFingerprint::from_path(path, options)
}

/// Loads a database and matches a file against it in one call.
pub fn match_file_against_db(
    db_path: &Path,
    input: &Path,
    options: &MatchOptions,
) -> Result<MatchResult> {
    let db = QuantDatabase::load(db_path)?;
    match_file(input, &db, options)
}
