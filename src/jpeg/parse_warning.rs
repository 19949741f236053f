/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;

use serde::Serialize;

use crate::fingerprint_error::ExitCode;

use super::marker_scanner::ScanStop;

/// A recoverable problem found while reading the header. None of these stop the
/// extraction, they only mean that some information may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// a marker segment had a damaged length field, scanning stopped there
    MalformedSegment {
        marker: u8,
        offset: usize,
        length: Option<u16>,
    },
    /// SOF payload shorter than the fixed 6 byte frame header
    FrameTooShort { offset: usize, available: usize },
    /// SOF declared a zero width or height
    ZeroDimension { offset: usize },
    /// SOF declared more components than its payload holds
    TruncatedComponentList {
        offset: usize,
        declared: u8,
        parsed: u8,
    },
    /// DQT sub-table header with a precision or table id outside the allowed range
    InvalidTableHeader {
        offset: usize,
        precision: u8,
        table_id: u8,
    },
    /// DQT sub-table ended before all 64 coefficients were present
    TruncatedTable {
        offset: usize,
        table_id: u8,
        needed: usize,
        available: usize,
    },
}

impl ParseWarning {
    pub fn from_scan_stop(stop: ScanStop) -> Option<Self> {
        match stop {
            ScanStop::TruncatedLength { marker, offset } => Some(ParseWarning::MalformedSegment {
                marker,
                offset,
                length: None,
            }),
            ScanStop::MalformedLength {
                marker,
                offset,
                length,
            } => Some(ParseWarning::MalformedSegment {
                marker,
                offset,
                length: Some(length),
            }),
            _ => None,
        }
    }

    /// classifies the warning using the same codes as fatal errors
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ParseWarning::TruncatedTable { .. } => ExitCode::TruncatedTable,
            _ => ExitCode::MalformedSegment,
        }
    }
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::MalformedSegment {
                marker,
                offset,
                length: Some(length),
            } => write!(
                f,
                "segment FF {marker:02X} at offset {offset} has invalid length {length}"
            ),
            ParseWarning::MalformedSegment {
                marker,
                offset,
                length: None,
            } => write!(
                f,
                "segment FF {marker:02X} at offset {offset} is missing its length"
            ),
            ParseWarning::FrameTooShort { offset, available } => write!(
                f,
                "frame header at offset {offset} has only {available} bytes"
            ),
            ParseWarning::ZeroDimension { offset } => {
                write!(f, "frame header at offset {offset} has a zero dimension")
            }
            ParseWarning::TruncatedComponentList {
                offset,
                declared,
                parsed,
            } => write!(
                f,
                "frame header at offset {offset} declares {declared} components, only {parsed} present"
            ),
            ParseWarning::InvalidTableHeader {
                offset,
                precision,
                table_id,
            } => write!(
                f,
                "DQT at offset {offset} has invalid precision {precision} / table id {table_id}"
            ),
            ParseWarning::TruncatedTable {
                offset,
                table_id,
                needed,
                available,
            } => write!(
                f,
                "DQT at offset {offset} table {table_id} truncated, needed {needed} bytes, {available} available"
            ),
        }
    }
}
