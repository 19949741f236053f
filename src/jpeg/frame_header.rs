/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::helpers::{lbits, rbits};

use super::parse_warning::ParseWarning;

/// Chroma subsampling class derived from the luma and first chroma sampling factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsampling {
    #[serde(rename = "444")]
    S444,
    #[serde(rename = "422")]
    S422,
    #[serde(rename = "420")]
    S420,
}

impl Subsampling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsampling::S444 => "444",
            Subsampling::S422 => "422",
            Subsampling::S420 => "420",
        }
    }

    /// Classifies from the (horizontal, vertical) sampling factors of luma and chroma.
    /// Unknown combinations are left unclassified rather than guessed.
    pub fn classify(luma: (u8, u8), chroma: (u8, u8)) -> Option<Self> {
        match (luma, chroma) {
            ((1, 1), (1, 1)) => Some(Subsampling::S444),
            ((2, 1), (1, 1)) => Some(Subsampling::S422),
            ((2, 2), (1, 1)) => Some(Subsampling::S420),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameComponent {
    /// jpeg internal id (1 = Y, 2 = Cb, 3 = Cr by convention)
    pub id: u8,

    /// sample factor horizontal
    pub sfh: u8,

    /// sample factor vertical
    pub sfv: u8,

    /// quantization table
    pub q_table_index: u8,
}

/// Frame level information from the first Start-Of-Frame segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameMetadata {
    pub width: u16,
    pub height: u16,
    pub progressive: bool,

    /// sample precision in bits
    pub precision: u8,

    /// number of components the frame header declared
    pub declared_components: u8,

    /// components actually present, may be fewer than declared if the segment was short
    pub components: Vec<FrameComponent>,

    pub subsampling: Option<Subsampling>,
}

impl FrameMetadata {
    /// quantization table ids referenced by the components, sorted and without duplicates
    pub fn referenced_table_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.components.iter().map(|c| c.q_table_index).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn component(&self, id: u8) -> Option<&FrameComponent> {
        self.components.iter().find(|c| c.id == id)
    }
}

/// Interprets the payload of a SOF0/SOF2 segment.
///
/// Layout: precision(1), height(2), width(2), component count(1), then for each
/// component id(1), sampling factors(1, horizontal in the high nibble), table(1).
///
/// Returns `None` if the payload can't hold the fixed header or declares a zero
/// dimension. A short component list is kept as far as it goes.
pub fn parse_frame_header(
    payload: &[u8],
    offset: usize,
    progressive: bool,
    warnings: &mut Vec<ParseWarning>,
) -> Option<FrameMetadata> {
    if payload.len() < 6 {
        warnings.push(ParseWarning::FrameTooShort {
            offset,
            available: payload.len(),
        });
        return None;
    }

    let precision = payload[0];
    let height = BigEndian::read_u16(&payload[1..3]);
    let width = BigEndian::read_u16(&payload[3..5]);
    let declared_components = payload[5];

    if width == 0 || height == 0 {
        warnings.push(ParseWarning::ZeroDimension { offset });
        return None;
    }

    let mut components = Vec::with_capacity(usize::from(declared_components));
    let mut hpos = 6;
    for _ in 0..declared_components {
        if hpos + 3 > payload.len() {
            warnings.push(ParseWarning::TruncatedComponentList {
                offset,
                declared: declared_components,
                parsed: components.len() as u8,
            });
            break;
        }

        components.push(FrameComponent {
            id: payload[hpos],
            sfh: lbits(payload[hpos + 1], 4),
            sfv: rbits(payload[hpos + 1], 4),
            q_table_index: payload[hpos + 2],
        });
        hpos += 3;
    }

    let mut frame = FrameMetadata {
        width,
        height,
        progressive,
        precision,
        declared_components,
        components,
        subsampling: None,
    };

    // Y is component 1, the first chroma component is 2
    frame.subsampling = match (frame.component(1), frame.component(2)) {
        (Some(y), Some(c)) => Subsampling::classify((y.sfh, y.sfv), (c.sfh, c.sfv)),
        _ => None,
    };

    Some(frame)
}

/// Frame information as persisted with each database record. Every field is
/// absent when the file had no usable frame header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JpegMeta {
    pub progressive: Option<bool>,
    pub subsampling: Option<Subsampling>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<Option<&FrameMetadata>> for JpegMeta {
    fn from(frame: Option<&FrameMetadata>) -> Self {
        match frame {
            Some(f) => JpegMeta {
                progressive: Some(f.progressive),
                subsampling: f.subsampling,
                width: Some(u32::from(f.width)),
                height: Some(u32::from(f.height)),
            },
            None => JpegMeta::default(),
        }
    }
}
