/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::consts::{COEFFICIENT_COUNT, RASTER_TO_ZIGZAG, ZIGZAG_TO_RASTER};
use crate::helpers::{lbits, rbits};

use super::parse_warning::ParseWarning;

/// 8x8 coefficient grid in natural (row-major) order
pub type QuantizationMatrix = [[u16; 8]; 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// one byte per coefficient
    Bits8,
    /// two big-endian bytes per coefficient
    Bits16,
}

impl Precision {
    fn from_nibble(p: u8) -> Option<Self> {
        match p {
            0 => Some(Precision::Bits8),
            1 => Some(Precision::Bits16),
            _ => None,
        }
    }

    pub fn bytes_per_coefficient(&self) -> usize {
        match self {
            Precision::Bits8 => 1,
            Precision::Bits16 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantizationTable {
    /// destination id 0..=3 from the DQT sub-table header
    pub table_id: u8,
    pub precision: Precision,
    values: QuantizationMatrix,
}

impl QuantizationTable {
    /// Builds a table from coefficients in the zigzag order they are stored in the file.
    /// This is the only place the zigzag permutation is undone.
    pub fn from_zigzag(table_id: u8, precision: Precision, zigzag: &[u16; 64]) -> Self {
        let mut values = [[0u16; 8]; 8];
        for coord in 0..COEFFICIENT_COUNT {
            values[coord / 8][coord % 8] = zigzag[usize::from(RASTER_TO_ZIGZAG[coord])];
        }

        QuantizationTable {
            table_id,
            precision,
            values,
        }
    }

    pub fn from_matrix(table_id: u8, precision: Precision, values: QuantizationMatrix) -> Self {
        QuantizationTable {
            table_id,
            precision,
            values,
        }
    }

    /// coefficients in natural order
    pub fn matrix(&self) -> &QuantizationMatrix {
        &self.values
    }

    /// coefficients flattened row by row
    pub fn row_major(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.iter().flat_map(|row| row.iter().copied())
    }

    /// coefficients in the zigzag order a JPEG encoder would store them
    pub fn to_zigzag(&self) -> [u16; 64] {
        let mut zigzag = [0u16; 64];
        for (i, z) in zigzag.iter_mut().enumerate() {
            let coord = usize::from(ZIGZAG_TO_RASTER[i]);
            *z = self.values[coord / 8][coord % 8];
        }
        zigzag
    }
}

/// Interprets the payload of a DQT segment, which can carry several tables back to back.
///
/// Each sub-table is a header byte (precision in the high nibble, id in the low nibble)
/// followed by 64 coefficients in zigzag order. A truncated sub-table is dropped with a
/// warning, tables parsed before it are kept. An invalid header abandons the rest of the
/// segment since its length can't be trusted.
pub fn parse_dqt_segment(
    payload: &[u8],
    offset: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<QuantizationTable> {
    let mut tables = Vec::new();
    let mut hpos = 0;

    while hpos < payload.len() {
        let header = payload[hpos];
        let table_id = rbits(header, 4);

        let precision = match Precision::from_nibble(lbits(header, 4)) {
            Some(p) if table_id <= 3 => p,
            _ => {
                warnings.push(ParseWarning::InvalidTableHeader {
                    offset,
                    precision: lbits(header, 4),
                    table_id,
                });
                break;
            }
        };
        hpos += 1;

        let needed = COEFFICIENT_COUNT * precision.bytes_per_coefficient();
        let available = payload.len() - hpos;
        if available < needed {
            warnings.push(ParseWarning::TruncatedTable {
                offset,
                table_id,
                needed,
                available,
            });
            break;
        }

        let mut zigzag = [0u16; 64];
        match precision {
            Precision::Bits8 => {
                for (z, b) in zigzag.iter_mut().zip(&payload[hpos..hpos + needed]) {
                    *z = u16::from(*b);
                }
            }
            Precision::Bits16 => {
                BigEndian::read_u16_into(&payload[hpos..hpos + needed], &mut zigzag);
            }
        }
        hpos += needed;

        tables.push(QuantizationTable::from_zigzag(table_id, precision, &zigzag));
    }

    tables
}

/// A table chosen for the luma or chroma role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedTable<'a> {
    pub table: &'a QuantizationTable,

    /// position in the list of tables found in the file
    pub index: usize,

    /// true if chosen by position because the expected table id was missing
    pub positional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableRoles<'a> {
    pub luma: Option<SelectedTable<'a>>,
    pub chroma: Option<SelectedTable<'a>>,
}

/// Chooses the luma and chroma tables from everything found in a file, in file order.
///
/// Luma is the first table with id 0, otherwise the first table. Chroma is the first
/// table with id 1, otherwise the second table if there are at least two. The fallbacks
/// are a heuristic: an encoder that writes its tables in an unusual order can end up
/// with the same table in both roles.
pub fn select_roles(tables: &[QuantizationTable]) -> TableRoles<'_> {
    let by_id = |id: u8| {
        tables
            .iter()
            .position(|t| t.table_id == id)
            .map(|index| SelectedTable {
                table: &tables[index],
                index,
                positional: false,
            })
    };

    let by_position = |index: usize| {
        tables.get(index).map(|table| SelectedTable {
            table,
            index,
            positional: true,
        })
    };

    TableRoles {
        luma: by_id(0).or_else(|| by_position(0)),
        chroma: by_id(1).or_else(|| by_position(1)),
    }
}
