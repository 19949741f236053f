/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// For each position of the 8x8 block in raster (row-major) order, the index of that
/// coefficient in the zigzag scan order JPEG uses to store it.
pub const RASTER_TO_ZIGZAG: [u8; 64] = [
    0, 1, 5, 6, 14, 15, 27, 28, 2, 4, 7, 13, 16, 26, 29, 42, 3, 8, 12, 17, 25, 30, 41, 43, 9, 11,
    18, 24, 31, 40, 44, 53, 10, 19, 23, 32, 39, 45, 52, 54, 20, 22, 33, 38, 46, 51, 55, 60, 21, 34,
    37, 47, 50, 56, 59, 61, 35, 36, 48, 49, 57, 58, 62, 63,
];

/// Inverse of `RASTER_TO_ZIGZAG`: for each zigzag index, the raster position it belongs to.
pub const ZIGZAG_TO_RASTER: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// number of coefficients in a quantization table
pub const COEFFICIENT_COUNT: usize = 64;

/// schema tag written into every persisted database, bump when the layout changes
pub const DATABASE_SCHEMA: &str = "qext.quantdb.v1";

/// file extensions recognized as JPEG when scanning a dataset
pub const DEFAULT_JPEG_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// smallest quality value accepted when inferring from a filename
pub const MIN_INFERRED_QUALITY: u32 = 0;

/// largest quality value accepted when inferring from a filename
pub const MAX_INFERRED_QUALITY: u32 = 1000;

/// score when both the luma and chroma digests are identical
pub const SCORE_FULL_MATCH: f64 = 1.0;

/// score when only the luma digest is identical
pub const SCORE_LUMA_ONLY: f64 = 0.7;

/// score when only the chroma digest is identical
pub const SCORE_CHROMA_ONLY: f64 = 0.6;

pub const MATCH_NOTES: [&str; 2] = [
    "Match based on quantization table equality (strong fingerprint, not conclusive proof).",
    "For a forensic report: document the encoder family, subsampling/progressive mode and chain of custody.",
];

pub const NOT_JPEG_NOTE: &str =
    "Input does not start with a JPEG Start-Of-Image marker, no tables could be extracted.";

#[test]
fn zigzag_tables_are_inverse() {
    for raster in 0..64 {
        let zz = RASTER_TO_ZIGZAG[raster] as usize;
        assert_eq!(ZIGZAG_TO_RASTER[zz] as usize, raster);
    }
}
