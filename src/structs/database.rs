/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::consts::DATABASE_SCHEMA;
use crate::fingerprint_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::jpeg::JpegMeta;

use super::fingerprint::{Fingerprint, QTables};

/// One labeled image. Created when the database is built and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseRecord {
    /// label of the directory the image was found in
    pub software: String,
    pub filename: String,

    /// absolute path at build time
    pub path: String,

    /// lowercase hex SHA-256 of the file
    pub sha256: String,

    /// best effort, taken from the file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,

    pub qtables: QTables,
    pub qhash: Fingerprint,
    pub jpeg_meta: JpegMeta,
}

/// Ordered collection of records together with the dataset they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantDatabase {
    pub schema: String,
    pub dataset_root: String,
    pub items: Vec<DatabaseRecord>,
}

impl QuantDatabase {
    pub fn new(dataset_root: impl Into<String>) -> Self {
        QuantDatabase {
            schema: DATABASE_SCHEMA.to_owned(),
            dataset_root: dataset_root.into(),
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reads a database, rejecting other schema versions and records of unknown shape.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_reader(reader).context()?;

        // checked before the typed parse so a newer layout reports the version, not a field
        match value.get("schema").and_then(|s| s.as_str()) {
            Some(DATABASE_SCHEMA) => {}
            Some(other) => {
                return err_exit_code(
                    ExitCode::SchemaMismatch,
                    format!("database schema is {other}, expected {DATABASE_SCHEMA}"),
                )
            }
            None => {
                return err_exit_code(
                    ExitCode::InvalidDatabase,
                    "database has no schema tag",
                )
            }
        }

        let db: QuantDatabase = serde_json::from_value(value).context()?;
        Ok(db)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).context()?;
        let db = Self::from_reader(BufReader::new(file))?;
        info!(
            "loaded {0} records from {1}",
            db.items.len(),
            path.display()
        );
        Ok(db)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context()
    }

    /// Writes the database as indented JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context()?;
            }
        }

        let mut writer = BufWriter::new(File::create(path).context()?);
        self.to_writer(&mut writer)?;
        writer.flush().context()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::Subsampling;

    fn record(software: &str, quality: Option<u32>) -> DatabaseRecord {
        DatabaseRecord {
            software: software.to_owned(),
            filename: format!("{software}.jpg"),
            path: format!("/data/{software}/{software}.jpg"),
            sha256: "00".repeat(32),
            quality,
            qtables: QTables {
                luma: Some([[2; 8]; 8]),
                cb: Some([[3; 8]; 8]),
                cr: Some([[3; 8]; 8]),
            },
            qhash: Fingerprint {
                luma: Some("aa".to_owned()),
                chroma: Some("bb".to_owned()),
            },
            jpeg_meta: JpegMeta {
                progressive: Some(false),
                subsampling: Some(Subsampling::S420),
                width: Some(64),
                height: Some(64),
            },
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");

        let mut db = QuantDatabase::new("/data");
        db.items.push(record("gimp", Some(90)));
        db.items.push(record("paint", None));
        db.save(&path).unwrap();

        let loaded = QuantDatabase::load(&path).unwrap();
        assert_eq!(loaded, db);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn persisted_layout() {
        let mut db = QuantDatabase::new("/data");
        db.items.push(record("paint", None));

        let v = serde_json::to_value(&db).unwrap();
        assert_eq!(v["schema"], "qext.quantdb.v1");
        assert_eq!(v["dataset_root"], "/data");

        let item = &v["items"][0];
        assert!(item.get("quality").is_none());
        assert_eq!(item["qhash"]["Y"], "aa");
        assert_eq!(item["qhash"]["C"], "bb");
        assert_eq!(item["qtables"]["Cb"], item["qtables"]["Cr"]);
        assert_eq!(item["qtables"]["Y"][7][7], 2);
        assert_eq!(item["jpeg_meta"]["subsampling"], "420");
    }

    #[test]
    fn null_quality_is_accepted() {
        let mut v = serde_json::to_value(&{
            let mut db = QuantDatabase::new("/data");
            db.items.push(record("x", None));
            db
        })
        .unwrap();
        v["items"][0]["quality"] = serde_json::Value::Null;

        let db = QuantDatabase::from_reader(v.to_string().as_bytes()).unwrap();
        assert_eq!(db.items[0].quality, None);
    }

    #[test]
    fn rejects_other_schema() {
        let json = r#"{"schema":"qext.quantdb.v2","dataset_root":"/","items":[],"extra":1}"#;
        let e = QuantDatabase::from_reader(json.as_bytes()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::SchemaMismatch);

        let e = QuantDatabase::from_reader(r#"{"items":[]}"#.as_bytes()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidDatabase);
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut v = serde_json::to_value(&{
            let mut db = QuantDatabase::new("/data");
            db.items.push(record("x", Some(1)));
            db
        })
        .unwrap();
        v["items"][0]["exif"] = serde_json::json!({"Make": "?"});

        let e = QuantDatabase::from_reader(v.to_string().as_bytes()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidDatabase);
    }

    #[test]
    fn rejects_garbage() {
        let e = QuantDatabase::from_reader("not json".as_bytes()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidDatabase);
    }
}
