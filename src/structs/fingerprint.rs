/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fingerprint_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::helpers::sha256_hex;
use crate::jpeg::jpeg_header::JpegHeader;
use crate::jpeg::{QuantizationMatrix, QuantizationTable, TableRoles};
use crate::options::ParseOptions;

/// Pair of digests over the canonical luma and chroma tables.
///
/// Either side is absent when the file had no table for that role, so a file without
/// any table has an empty fingerprint that can never match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fingerprint {
    #[serde(rename = "Y", default, skip_serializing_if = "Option::is_none")]
    pub luma: Option<String>,

    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub chroma: Option<String>,
}

impl Fingerprint {
    pub fn from_roles(roles: &TableRoles<'_>) -> Self {
        Fingerprint {
            luma: roles.luma.map(|s| table_digest(s.table)),
            chroma: roles.chroma.map(|s| table_digest(s.table)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.luma.is_none() && self.chroma.is_none()
    }
}

/// The 64 coefficients in row-major order as comma separated decimals. This is the
/// exact text that gets digested, so it must never change for a given table.
pub fn canonical_form(table: &QuantizationTable) -> String {
    let mut s = String::with_capacity(64 * 4);
    for (i, v) in table.row_major().enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(&v.to_string());
    }
    s
}

/// lowercase hex SHA-256 of the canonical form of a table
pub fn table_digest(table: &QuantizationTable) -> String {
    sha256_hex(canonical_form(table).as_bytes())
}

/// The tables in the shape they are persisted: luma as `Y`, chroma duplicated as `Cb`
/// and `Cr` since most encoders share one chroma table between both components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QTables {
    #[serde(rename = "Y", default, skip_serializing_if = "Option::is_none")]
    pub luma: Option<QuantizationMatrix>,

    #[serde(rename = "Cb", default, skip_serializing_if = "Option::is_none")]
    pub cb: Option<QuantizationMatrix>,

    #[serde(rename = "Cr", default, skip_serializing_if = "Option::is_none")]
    pub cr: Option<QuantizationMatrix>,
}

impl QTables {
    pub fn from_roles(roles: &TableRoles<'_>) -> Self {
        let chroma = roles.chroma.map(|s| *s.table.matrix());
        QTables {
            luma: roles.luma.map(|s| *s.table.matrix()),
            cb: chroma,
            cr: chroma,
        }
    }
}

/// Everything extracted from one file.
#[derive(Debug, Clone)]
pub struct FileFingerprint {
    /// lowercase hex SHA-256 of the whole file
    pub sha256: String,
    pub header: JpegHeader,
    pub fingerprint: Fingerprint,
    pub qtables: QTables,
}

impl FileFingerprint {
    /// Fingerprints a file that is already in memory. Never fails, a buffer that
    /// isn't a JPEG simply yields an empty fingerprint.
    pub fn from_bytes(data: &[u8], options: &ParseOptions) -> Self {
        let header = JpegHeader::parse(data, options);
        let roles = header.roles();

        let fingerprint = Fingerprint::from_roles(&roles);
        let qtables = QTables::from_roles(&roles);

        FileFingerprint {
            sha256: sha256_hex(data),
            header,
            fingerprint,
            qtables,
        }
    }

    /// Reads and fingerprints a file, refusing files above `options.max_file_size`.
    pub fn from_path(path: &Path, options: &ParseOptions) -> Result<Self> {
        let data = read_file(path, options.max_file_size)?;
        Ok(Self::from_bytes(&data, options))
    }
}

fn read_file(path: &Path, max_file_size: u64) -> Result<Vec<u8>> {
    let file = File::open(path).context()?;
    let size = file.metadata().context()?.len();
    if size > max_file_size {
        return err_exit_code(
            ExitCode::OsError,
            format!(
                "{0} is {1} bytes, larger than the limit of {2}",
                path.display(),
                size,
                max_file_size
            ),
        );
    }

    let mut data = Vec::with_capacity(size as usize);
    file.take(max_file_size).read_to_end(&mut data).context()?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::{select_roles, Precision};

    fn ramp(id: u8) -> QuantizationTable {
        let mut m = [[0u16; 8]; 8];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (r * 8 + c + 1) as u16;
            }
        }
        QuantizationTable::from_matrix(id, Precision::Bits8, m)
    }

    #[test]
    fn canonical_form_is_row_major() {
        let s = canonical_form(&ramp(0));
        assert!(s.starts_with("1,2,3,4,5,6,7,8,9,"));
        assert!(s.ends_with(",63,64"));
        assert_eq!(s.split(',').count(), 64);
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(table_digest(&ramp(0)), table_digest(&ramp(0)));
        // the table id and precision are not part of the fingerprint
        let mut sixteen = QuantizationTable::from_matrix(3, Precision::Bits16, *ramp(0).matrix());
        assert_eq!(table_digest(&ramp(0)), table_digest(&sixteen));

        sixteen = QuantizationTable::from_matrix(0, Precision::Bits8, [[1; 8]; 8]);
        assert_eq!(
            table_digest(&sixteen),
            sha256_hex(vec!["1"; 64].join(",").as_bytes())
        );
    }

    #[test]
    fn any_coefficient_change_changes_digest() {
        let base = ramp(0);
        let base_digest = table_digest(&base);

        for pos in 0..64 {
            let mut m = *base.matrix();
            m[pos / 8][pos % 8] += 1;
            let changed = QuantizationTable::from_matrix(0, Precision::Bits8, m);
            assert_ne!(table_digest(&changed), base_digest, "position {pos}");
        }
    }

    #[test]
    fn fingerprint_from_roles() {
        let tables = [ramp(0), QuantizationTable::from_matrix(1, Precision::Bits8, [[5; 8]; 8])];
        let roles = select_roles(&tables);
        let fp = Fingerprint::from_roles(&roles);

        assert_eq!(fp.luma, Some(table_digest(&tables[0])));
        assert_eq!(fp.chroma, Some(table_digest(&tables[1])));

        let q = QTables::from_roles(&roles);
        assert_eq!(q.cb, q.cr);
        assert_eq!(q.cb.unwrap()[3][3], 5);

        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(json["Y"], serde_json::json!(fp.luma.unwrap()));
    }

    #[test]
    fn empty_fingerprint_serializes_without_keys() {
        let fp = Fingerprint::from_roles(&select_roles(&[]));
        assert!(fp.is_empty());
        assert_eq!(serde_json::to_string(&fp).unwrap(), "{}");
        assert_eq!(serde_json::to_string(&QTables::default()).unwrap(), "{}");
    }

    #[test]
    fn not_a_jpeg_has_empty_fingerprint() {
        let f = FileFingerprint::from_bytes(b"not a jpeg at all", &ParseOptions::default());
        assert!(!f.header.is_jpeg);
        assert!(f.fingerprint.is_empty());
        assert_eq!(f.sha256, sha256_hex(b"not a jpeg at all"));
    }

    #[test]
    fn oversized_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        std::fs::write(&path, [0xFFu8; 32]).unwrap();

        let options = ParseOptions {
            max_file_size: 16,
            ..ParseOptions::default()
        };
        let e = FileFingerprint::from_path(&path, &options).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::OsError);

        let e = FileFingerprint::from_path(&dir.path().join("missing.jpg"), &options).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::FileNotFound);
    }
}
