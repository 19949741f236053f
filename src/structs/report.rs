/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::path::Path;

use serde::Serialize;

use crate::fingerprint_error::Result;
use crate::jpeg::{FrameMetadata, ParseWarning, QuantizationTable, SelectedTable};
use crate::options::ParseOptions;

use super::database::QuantDatabase;
use super::fingerprint::{FileFingerprint, Fingerprint};

/// How a table was chosen for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChoice {
    /// index into `tables`
    pub index: usize,
    pub table_id: u8,
    pub positional: bool,
}

impl From<SelectedTable<'_>> for RoleChoice {
    fn from(s: SelectedTable<'_>) -> Self {
        RoleChoice {
            index: s.index,
            table_id: s.table.table_id,
            positional: s.positional,
        }
    }
}

/// Everything the header reader found in one file, for manual inspection.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderInspection {
    pub path: String,
    pub sha256: String,
    pub is_jpeg: bool,
    pub frame: Option<FrameMetadata>,
    pub tables: Vec<QuantizationTable>,
    pub luma: Option<RoleChoice>,
    pub chroma: Option<RoleChoice>,
    pub qhash: Fingerprint,
    pub warnings: Vec<ParseWarning>,
}

pub fn inspect_file(path: &Path, options: &ParseOptions) -> Result<HeaderInspection> {
    let file = FileFingerprint::from_path(path, options)?;
    let roles = file.header.roles();
    let luma = roles.luma.map(RoleChoice::from);
    let chroma = roles.chroma.map(RoleChoice::from);

    Ok(HeaderInspection {
        path: path.to_string_lossy().into_owned(),
        sha256: file.sha256,
        is_jpeg: file.header.is_jpeg,
        frame: file.header.frame,
        tables: file.header.tables,
        luma,
        chroma,
        qhash: file.fingerprint,
        warnings: file.header.warnings,
    })
}

/// Per label totals of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareSummary {
    pub software: String,
    pub records: usize,

    /// distinct inferred qualities, ascending
    pub qualities: Vec<u32>,
    pub unique_luma: usize,
    pub unique_chroma: usize,
}

pub fn summarize_database(db: &QuantDatabase) -> Vec<SoftwareSummary> {
    #[derive(Default)]
    struct Acc<'a> {
        records: usize,
        qualities: BTreeSet<u32>,
        luma: BTreeSet<&'a str>,
        chroma: BTreeSet<&'a str>,
    }

    let mut by_label: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in &db.items {
        let acc = by_label.entry(r.software.as_str()).or_default();
        acc.records += 1;
        acc.qualities.extend(r.quality);
        acc.luma.extend(r.qhash.luma.as_deref());
        acc.chroma.extend(r.qhash.chroma.as_deref());
    }

    by_label
        .into_iter()
        .map(|(software, acc)| SoftwareSummary {
            software: software.to_owned(),
            records: acc.records,
            qualities: acc.qualities.into_iter().collect(),
            unique_luma: acc.luma.len(),
            unique_chroma: acc.chroma.len(),
        })
        .collect()
}

/// Which labels produce the same luma table at one quality setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityComparison {
    pub quality: u32,

    /// labels sharing a luma digest, largest group first
    pub groups: Vec<Vec<String>>,

    /// labels without any record at this quality
    pub missing: Vec<String>,
}

impl Display for QualityComparison {
    /// `90: gimp = photoshop vs pixlr (missing: paint)`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let groups: Vec<String> = self.groups.iter().map(|g| g.join(" = ")).collect();
        write!(f, "{0}: {1}", self.quality, groups.join(" vs "))?;
        if !self.missing.is_empty() {
            write!(f, " (missing: {0})", self.missing.join(", "))?;
        }
        Ok(())
    }
}

/// Groups labels by identical luma digest for every quality present in the database.
///
/// When a label has several records at one quality the first one in database order is
/// used. Records without an inferred quality are not compared.
pub fn compare_by_quality(db: &QuantDatabase) -> Vec<QualityComparison> {
    let labels: BTreeSet<&str> = db.items.iter().map(|r| r.software.as_str()).collect();

    let mut by_quality: BTreeMap<u32, BTreeMap<&str, Option<&str>>> = BTreeMap::new();
    for r in &db.items {
        if let Some(q) = r.quality {
            by_quality
                .entry(q)
                .or_default()
                .entry(r.software.as_str())
                .or_insert(r.qhash.luma.as_deref());
        }
    }

    by_quality
        .into_iter()
        .map(|(quality, luma_by_label)| {
            let mut groups: HashMap<&str, Vec<String>> = HashMap::new();
            let mut without_table = Vec::new();
            let mut missing = Vec::new();

            // labels is sorted, so every group comes out sorted as well
            for label in &labels {
                match luma_by_label.get(label) {
                    Some(Some(digest)) => {
                        groups.entry(*digest).or_default().push(label.to_string())
                    }
                    Some(None) => without_table.push(vec![label.to_string()]),
                    None => missing.push(label.to_string()),
                }
            }

            // no table means nothing to compare, each such label stands alone
            let mut groups: Vec<Vec<String>> = groups.into_values().collect();
            groups.extend(without_table);
            groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

            QualityComparison {
                quality,
                groups,
                missing,
            }
        })
        .collect()
}
