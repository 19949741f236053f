/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fs;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use jpeg_qtable_fingerprint::{
    build_database, compare_by_quality, fingerprint_file, match_bytes, match_file,
    summarize_database, BuildOptions, ExitCode, FileFingerprint, MatchOptions, ParseOptions,
    QuantDatabase,
};

const SIZE: u32 = 64;

/// synthetic RGB test card: a gradient, or seeded noise so two images differ in every pixel
fn synthetic_pixels(seed: Option<u64>) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((SIZE * SIZE * 3) as usize);
    match seed {
        None => {
            for y in 0..SIZE {
                for x in 0..SIZE {
                    pixels.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8]);
                }
            }
        }
        Some(seed) => {
            let mut rng = rand_chacha::ChaCha12Rng::seed_from_u64(seed);
            pixels.resize((SIZE * SIZE * 3) as usize, 0);
            rng.fill(&mut pixels[..]);
        }
    }
    pixels
}

fn encode_jpeg(quality: u8, seed: Option<u64>) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&synthetic_pixels(seed), SIZE, SIZE, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn write_jpeg(path: &Path, quality: u8, seed: Option<u64>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, encode_jpeg(quality, seed)).unwrap();
}

#[test]
fn same_quality_gives_identical_fingerprints() {
    let a = encode_jpeg(90, None);
    let b = encode_jpeg(90, Some(1));
    assert_ne!(a, b);

    let fa = FileFingerprint::from_bytes(&a, &ParseOptions::default());
    let fb = FileFingerprint::from_bytes(&b, &ParseOptions::default());

    assert_ne!(fa.sha256, fb.sha256);
    assert!(fa.fingerprint.luma.is_some());
    assert!(fa.fingerprint.chroma.is_some());
    assert_eq!(fa.fingerprint, fb.fingerprint);
    assert_eq!(fa.qtables, fb.qtables);

    let frame = fa.header.frame.as_ref().unwrap();
    assert_eq!((frame.width, frame.height), (64, 64));
    assert!(!frame.progressive);
    assert!(fa.header.warnings.is_empty());
}

#[rstest]
fn quality_changes_luma_digest(#[values(50, 75, 95)] other: u8) {
    let a = FileFingerprint::from_bytes(&encode_jpeg(90, None), &ParseOptions::default());
    let b = FileFingerprint::from_bytes(&encode_jpeg(other, None), &ParseOptions::default());
    assert_ne!(a.fingerprint.luma, b.fingerprint.luma);
}

#[test]
fn early_stop_does_not_change_fingerprint() {
    let data = encode_jpeg(80, Some(3));
    let quick = FileFingerprint::from_bytes(&data, &ParseOptions::default());
    let full = FileFingerprint::from_bytes(&data, &ParseOptions::exhaustive());

    assert!(quick.header.stopped_early);
    assert!(!full.header.stopped_early);
    assert!(quick.header.segment_count < full.header.segment_count);
    assert_eq!(quick.fingerprint, full.fingerprint);
    assert_eq!(quick.header.frame, full.header.frame);
}

#[test]
fn build_infers_quality_from_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("dataset");
    write_jpeg(&root.join("encoder").join("score_90.jpg"), 90, None);
    write_jpeg(&root.join("encoder").join("score_77.jpg"), 77, None);
    write_jpeg(&root.join("encoder").join("x.jpg"), 60, None);

    let (db, report) = build_database(&root, &BuildOptions::default()).unwrap();
    assert_eq!(report.processed, 3);
    assert!(report.skipped.is_empty());

    let qualities: Vec<_> = db
        .items
        .iter()
        .map(|r| (r.filename.as_str(), r.quality))
        .collect();
    assert_eq!(
        qualities,
        vec![
            ("score_77.jpg", Some(77)),
            ("score_90.jpg", Some(90)),
            ("x.jpg", None)
        ]
    );

    for r in &db.items {
        assert_eq!(r.software, "encoder");
        assert_eq!(r.sha256.len(), 64);
        assert!(Path::new(&r.path).is_absolute());
        assert_eq!(r.qtables.cb, r.qtables.cr);
        assert_eq!(r.jpeg_meta.width, Some(64));
    }
}

#[test]
fn database_roundtrip_and_match() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("dataset");
    for q in [70u8, 80, 90] {
        write_jpeg(&root.join("alpha").join(format!("{q}.jpg")), q, None);
        write_jpeg(&root.join("beta").join(format!("q{q}.jpeg")), q, Some(u64::from(q)));
    }
    fs::write(root.join("beta").join("readme.jpg"), b"not an image").unwrap();

    let (db, report) = build_database(&root, &BuildOptions::default()).unwrap();
    assert_eq!(report.processed, 6);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].exit_code, ExitCode::NotJpeg);

    let db_path = dir.path().join("out").join("db.json");
    db.save(&db_path).unwrap();
    let loaded = QuantDatabase::load(&db_path).unwrap();
    assert_eq!(loaded, db);

    let query = dir.path().join("query.jpg");
    write_jpeg(&query, 80, Some(99));

    let result = match_file(&query, &loaded, &MatchOptions::default()).unwrap();
    let query_fingerprint = fingerprint_file(&query, &ParseOptions::default()).unwrap();
    assert_eq!(result.input.sha256, query_fingerprint.sha256);
    assert_eq!(result.hits.len(), 2);
    assert_eq!(result.hits[0].software, "alpha");
    assert_eq!(result.hits[0].quality, Some(80));
    assert_eq!(result.hits[0].score, 1.0);
    assert_eq!(result.hits[1].software, "beta");
    assert_eq!(result.notes.len(), 2);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["input"]["qhash"]["Y"].is_string());
    assert_eq!(json["hits"][0]["filename"], "80.jpg");

    // same encoder family everywhere, so both labels group together at every quality
    let comparison = compare_by_quality(&loaded);
    assert_eq!(comparison.len(), 3);
    assert_eq!(comparison[1].to_string(), "80: alpha = beta");

    let summary = summarize_database(&loaded);
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].qualities, vec![70, 80, 90]);
    assert_eq!(summary[0].unique_luma, 3);
}

#[test]
fn query_without_hits_still_returns_result() {
    let db = QuantDatabase::new("/");

    let data = encode_jpeg(85, None);
    let result = match_bytes("mem.jpg", &data, &db, &MatchOptions::default()).unwrap();
    assert!(result.hits.is_empty());
    assert!(!result.input.qhash.is_empty());
}

#[test]
fn truncated_encoder_output_never_panics() {
    let data = encode_jpeg(90, Some(5));
    let full = FileFingerprint::from_bytes(&data, &ParseOptions::exhaustive());

    for cut in (0..data.len()).step_by(7) {
        let partial = FileFingerprint::from_bytes(&data[..cut], &ParseOptions::exhaustive());
        assert!(partial.header.tables.len() <= full.header.tables.len());
    }
}
