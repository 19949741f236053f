/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::cmp::Ordering;
use std::path::Path;
use std::thread;

use log::{debug, info};
use serde::Serialize;

use crate::consts::{
    MATCH_NOTES, NOT_JPEG_NOTE, SCORE_CHROMA_ONLY, SCORE_FULL_MATCH, SCORE_LUMA_ONLY,
};
use crate::fingerprint_error::{ExitCode, FingerprintError, Result};
use crate::options::MatchOptions;

use super::database::{DatabaseRecord, QuantDatabase};
use super::fingerprint::{FileFingerprint, Fingerprint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchHit {
    pub software: String,
    pub quality: Option<u32>,
    pub filename: String,
    pub sha256: String,
    pub score: f64,
}

impl MatchHit {
    fn new(record: &DatabaseRecord, score: f64) -> Self {
        MatchHit {
            software: record.software.clone(),
            quality: record.quality,
            filename: record.filename.clone(),
            sha256: record.sha256.clone(),
            score,
        }
    }
}

/// What was matched, so the result can be audited later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchInput {
    pub path: String,
    pub sha256: String,
    pub qhash: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub input: MatchInput,
    pub hits: Vec<MatchHit>,
    pub notes: Vec<String>,
}

/// Scores a record against the query. A side only counts if the query has it and the
/// record carries the identical digest. `None` means the record is not a hit.
pub fn score_record(query: &Fingerprint, record: &Fingerprint) -> Option<f64> {
    let luma_ok = query.luma.is_some() && query.luma == record.luma;
    let chroma_ok = query.chroma.is_some() && query.chroma == record.chroma;

    match (luma_ok, chroma_ok) {
        (true, true) => Some(SCORE_FULL_MATCH),
        (true, false) => Some(SCORE_LUMA_ONLY),
        (false, true) => Some(SCORE_CHROMA_ONLY),
        (false, false) => None,
    }
}

/// Ranking order: higher score first, then software label, then quality with unknown
/// qualities after all known ones.
pub fn compare_hits(a: &MatchHit, b: &MatchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.software.cmp(&b.software))
        .then_with(|| match (a.quality, b.quality) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

fn scan_records(query: &Fingerprint, records: &[DatabaseRecord]) -> Vec<MatchHit> {
    records
        .iter()
        .filter_map(|r| score_record(query, &r.qhash).map(|score| MatchHit::new(r, score)))
        .collect()
}

/// Scores every record of the database and returns the best `top_k` hits.
///
/// With more than one thread the records are split into contiguous shards scanned on
/// scoped threads. The shards are concatenated in order before the (stable) sort, so the
/// ranking is the same as a single threaded scan.
pub fn match_fingerprint(
    query: &Fingerprint,
    db: &QuantDatabase,
    options: &MatchOptions,
) -> Result<Vec<MatchHit>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let threads = options.threads.max(1).min(db.items.len().max(1));

    let mut hits = if threads == 1 {
        scan_records(query, &db.items)
    } else {
        let shard_size = db.items.len().div_ceil(threads);
        debug!("scanning {0} records in shards of {1}", db.items.len(), shard_size);

        thread::scope(|s| {
            let handles: Vec<_> = db
                .items
                .chunks(shard_size)
                .map(|shard| s.spawn(move || scan_records(query, shard)))
                .collect();

            let mut merged = Vec::new();
            for h in handles {
                match h.join() {
                    Ok(shard_hits) => merged.extend(shard_hits),
                    Err(_) => {
                        return Err(FingerprintError::new(
                            ExitCode::AssertionFailure,
                            "match shard panicked",
                        ))
                    }
                }
            }
            Ok(merged)
        })?
    };

    hits.sort_by(compare_hits);
    hits.truncate(options.top_k);
    Ok(hits)
}

fn notes(is_jpeg: bool) -> Vec<String> {
    let mut notes: Vec<String> = MATCH_NOTES.iter().map(|n| n.to_string()).collect();
    if !is_jpeg {
        notes.push(NOT_JPEG_NOTE.to_owned());
    }
    notes
}

/// Matches a buffer already in memory. `path` is only reported back in the result.
pub fn match_bytes(
    path: &str,
    data: &[u8],
    db: &QuantDatabase,
    options: &MatchOptions,
) -> Result<MatchResult> {
    let file = FileFingerprint::from_bytes(data, &options.parse);
    let hits = match_fingerprint(&file.fingerprint, db, options)?;

    Ok(MatchResult {
        input: MatchInput {
            path: path.to_owned(),
            sha256: file.sha256,
            qhash: file.fingerprint,
        },
        hits,
        notes: notes(file.header.is_jpeg),
    })
}

/// Fingerprints the file at `path` and matches it against the database. The result is
/// returned even when nothing matched.
pub fn match_file(path: &Path, db: &QuantDatabase, options: &MatchOptions) -> Result<MatchResult> {
    let file = FileFingerprint::from_path(path, &options.parse)?;
    let hits = match_fingerprint(&file.fingerprint, db, options)?;

    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    info!(
        "{0}: {1} hits against {2} records",
        resolved.display(),
        hits.len(),
        db.items.len()
    );

    Ok(MatchResult {
        input: MatchInput {
            path: resolved.to_string_lossy().into_owned(),
            sha256: file.sha256,
            qhash: file.fingerprint,
        },
        hits,
        notes: notes(file.header.is_jpeg),
    })
}
