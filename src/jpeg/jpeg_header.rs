/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::{debug, warn};

use crate::fingerprint_error::ExitCode;
use crate::options::ParseOptions;

use super::frame_header::{parse_frame_header, FrameMetadata};
use super::jpeg_code;
use super::marker_scanner::{MarkerScanner, ScanStop, SegmentKind};
use super::parse_warning::ParseWarning;
use super::quantization_table::{parse_dqt_segment, select_roles, QuantizationTable, TableRoles};

/// Everything the fingerprinting needs from a JPEG header.
#[derive(Debug, Clone, Default)]
pub struct JpegHeader {
    /// false if the buffer did not start with a Start-Of-Image marker
    pub is_jpeg: bool,

    /// first usable SOF0/SOF2 frame header
    pub frame: Option<FrameMetadata>,

    /// every quantization table definition, in file order
    pub tables: Vec<QuantizationTable>,

    pub warnings: Vec<ParseWarning>,

    /// number of marker segments visited
    pub segment_count: usize,

    /// true if scanning stopped because everything needed had been found
    pub stopped_early: bool,
}

impl JpegHeader {
    /// Reads the marker segments of a JPEG held in memory.
    ///
    /// Never fails: structural damage ends the scan and is reported in `warnings`,
    /// a buffer that isn't a JPEG comes back with `is_jpeg == false` and no data.
    pub fn parse(data: &[u8], options: &ParseOptions) -> JpegHeader {
        let mut scanner = MarkerScanner::new(data);
        let mut header = JpegHeader {
            is_jpeg: scanner.is_jpeg(),
            ..JpegHeader::default()
        };

        if !header.is_jpeg {
            debug!("buffer of {0} bytes is not a JPEG", data.len());
            return header;
        }

        for segment in scanner.by_ref() {
            header.segment_count += 1;
            debug!(
                "segment FF {0:02X} at offset {1}, {2} bytes",
                segment.marker,
                segment.offset,
                segment.payload.len()
            );

            match segment.kind() {
                SegmentKind::StartOfFrame { progressive } if header.frame.is_none() => {
                    header.frame = parse_frame_header(
                        segment.payload,
                        segment.offset,
                        progressive,
                        &mut header.warnings,
                    );
                }
                SegmentKind::DefineQuantizationTable => {
                    let tables =
                        parse_dqt_segment(segment.payload, segment.offset, &mut header.warnings);
                    header.tables.extend(tables);
                }
                _ => {}
            }

            if options.stop_early && header.has_referenced_tables() && header.roles_are_final() {
                header.stopped_early = true;
                break;
            }
        }

        if let Some(stop) = scanner.stop_reason() {
            header.recover_truncated_dqt(data, stop);
        }

        for w in &header.warnings {
            warn!("{0}", w);
        }

        header
    }

    /// A DQT whose declared length runs past the end of the buffer still holds whatever
    /// complete sub-tables were written before the cut.
    fn recover_truncated_dqt(&mut self, data: &[u8], stop: ScanStop) {
        if let Some(w) = ParseWarning::from_scan_stop(stop) {
            self.warnings.push(w);
        }

        if let ScanStop::MalformedLength {
            marker: jpeg_code::DQT,
            offset,
            length,
        } = stop
        {
            // marker(2) + length(2), the scanner already verified these bytes exist
            let start = offset + 4;
            if length >= 2 && start <= data.len() {
                let tables = parse_dqt_segment(&data[start..], offset, &mut self.warnings);
                self.tables.extend(tables);
            }
        }
    }

    /// true once a frame was seen and every table its components reference is defined
    pub fn has_referenced_tables(&self) -> bool {
        match &self.frame {
            Some(frame) => {
                let ids = frame.referenced_table_ids();
                !ids.is_empty()
                    && ids
                        .iter()
                        .all(|id| self.tables.iter().any(|t| t.table_id == *id))
            }
            None => false,
        }
    }

    /// true once tables with id 0 and id 1 were both defined, later tables can then no
    /// longer replace the luma or chroma choice of `select_roles`
    pub fn roles_are_final(&self) -> bool {
        [0, 1]
            .iter()
            .all(|id| self.tables.iter().any(|t| t.table_id == *id))
    }

    /// luma and chroma tables chosen from everything found
    pub fn roles(&self) -> TableRoles<'_> {
        select_roles(&self.tables)
    }

    /// classification of the first problem encountered, if any
    pub fn first_exit_code(&self) -> Option<ExitCode> {
        if !self.is_jpeg {
            return Some(ExitCode::NotJpeg);
        }
        self.warnings.iter().map(|w| w.exit_code()).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::frame_header::Subsampling;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![0xFF, marker];
        v.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        v.extend_from_slice(payload);
        v
    }

    fn dqt_payload(ids: &[(u8, u8)]) -> Vec<u8> {
        let mut p = Vec::new();
        for &(id, value) in ids {
            p.push(id);
            p.extend(std::iter::repeat(value).take(64));
        }
        p
    }

    fn sof0(width: u16, height: u16) -> Vec<u8> {
        let mut p = vec![8];
        p.extend_from_slice(&height.to_be_bytes());
        p.extend_from_slice(&width.to_be_bytes());
        p.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        segment(jpeg_code::SOF0, &p)
    }

    /// minimal JPEG: SOI, DQT (two tables), SOF0, scan data, EOI
    fn sample_jpeg() -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8];
        v.extend(segment(0xE0, b"JFIF\0"));
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(0, 4), (1, 9)])));
        v.extend(sof0(320, 240));
        v.extend(segment(jpeg_code::SOS, &[1, 1, 0, 0, 63, 0]));
        v.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34]);
        v.extend_from_slice(&[0xFF, 0xD9]);
        v
    }

    #[test]
    fn parses_frame_and_tables() {
        let header = JpegHeader::parse(&sample_jpeg(), &ParseOptions::exhaustive());

        assert!(header.is_jpeg);
        assert!(header.warnings.is_empty());
        assert!(!header.stopped_early);
        assert_eq!(header.segment_count, 6);
        assert_eq!(header.first_exit_code(), None);

        let frame = header.frame.as_ref().unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert!(!frame.progressive);
        assert_eq!(frame.subsampling, Some(Subsampling::S420));

        assert_eq!(header.tables.len(), 2);
        let roles = header.roles();
        assert_eq!(roles.luma.unwrap().table.matrix()[0][0], 4);
        assert_eq!(roles.chroma.unwrap().table.matrix()[0][0], 9);
    }

    #[test]
    fn stops_once_tables_are_known() {
        let header = JpegHeader::parse(&sample_jpeg(), &ParseOptions::default());
        assert!(header.stopped_early);
        // SOI, APP0, DQT, SOF0
        assert_eq!(header.segment_count, 4);
        assert_eq!(header.tables.len(), 2);
    }

    #[test]
    fn does_not_stop_before_late_tables() {
        // SOF first, chroma table defined in a second DQT
        let mut v = vec![0xFF, 0xD8];
        v.extend(sof0(16, 16));
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(0, 4)])));
        v.extend(segment(0xFE, b"comment"));
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(1, 6)])));
        v.extend_from_slice(&[0xFF, 0xD9]);

        let header = JpegHeader::parse(&v, &ParseOptions::default());
        assert!(header.stopped_early);
        assert_eq!(header.tables.len(), 2);
        assert_eq!(header.roles().chroma.unwrap().table.matrix()[7][7], 6);
    }

    #[test]
    fn early_stop_waits_for_chroma_candidate() {
        // grayscale frame referencing only table 0, table 1 follows in a later DQT
        let mut sof = vec![8];
        sof.extend_from_slice(&16u16.to_be_bytes());
        sof.extend_from_slice(&16u16.to_be_bytes());
        sof.extend_from_slice(&[1, 1, 0x11, 0]);

        let mut v = vec![0xFF, 0xD8];
        v.extend(segment(jpeg_code::SOF0, &sof));
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(0, 4)])));
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(1, 6)])));
        v.extend_from_slice(&[0xFF, 0xD9]);

        let quick = JpegHeader::parse(&v, &ParseOptions::default());
        let full = JpegHeader::parse(&v, &ParseOptions::exhaustive());

        assert_eq!(quick.tables, full.tables);
        assert_eq!(quick.roles(), full.roles());
        assert_eq!(quick.roles().chroma.unwrap().table.matrix()[0][0], 6);
    }

    #[test]
    fn grayscale_without_second_table_reads_to_the_end() {
        let mut sof = vec![8];
        sof.extend_from_slice(&8u16.to_be_bytes());
        sof.extend_from_slice(&8u16.to_be_bytes());
        sof.extend_from_slice(&[1, 1, 0x11, 0]);

        let mut v = vec![0xFF, 0xD8];
        v.extend(segment(jpeg_code::DQT, &dqt_payload(&[(0, 4)])));
        v.extend(segment(jpeg_code::SOF0, &sof));
        v.extend(segment(0xFE, b"comment"));
        v.extend_from_slice(&[0xFF, 0xD9]);

        let header = JpegHeader::parse(&v, &ParseOptions::default());
        assert!(!header.stopped_early);
        assert!(header.has_referenced_tables());
        assert!(!header.roles_are_final());
        assert!(header.roles().chroma.is_none());
    }

    #[test]
    fn only_first_frame_is_used() {
        let mut v = vec![0xFF, 0xD8];
        v.extend(sof0(100, 50));
        v.extend(sof0(8, 8));
        v.extend_from_slice(&[0xFF, 0xD9]);

        let header = JpegHeader::parse(&v, &ParseOptions::default());
        let frame = header.frame.unwrap();
        assert_eq!((frame.width, frame.height), (100, 50));
    }

    #[test]
    fn rejected_frame_does_not_count_as_first() {
        let mut v = vec![0xFF, 0xD8];
        v.extend(sof0(0, 50));
        v.extend(sof0(8, 8));
        v.extend_from_slice(&[0xFF, 0xD9]);

        let header = JpegHeader::parse(&v, &ParseOptions::default());
        let frame = header.frame.as_ref().unwrap();
        assert_eq!((frame.width, frame.height), (8, 8));
        assert_eq!(
            header.first_exit_code(),
            Some(ExitCode::MalformedSegment)
        );
    }

    #[test]
    fn truncated_mid_dqt_keeps_complete_tables() {
        let full = sample_jpeg();
        // cut inside the second table of the DQT: SOI(2) + APP0(9) + FFDB len(4) + 65 + 10
        let cut = 2 + 9 + 4 + 65 + 10;
        let header = JpegHeader::parse(&full[..cut], &ParseOptions::default());

        assert!(header.is_jpeg);
        assert!(header.frame.is_none());
        assert_eq!(header.tables.len(), 1);
        assert_eq!(header.tables[0].table_id, 0);
        assert_eq!(
            header.warnings,
            vec![
                ParseWarning::MalformedSegment {
                    marker: jpeg_code::DQT,
                    offset: 11,
                    length: Some(2 + 130)
                },
                ParseWarning::TruncatedTable {
                    offset: 11,
                    table_id: 1,
                    needed: 64,
                    available: 9
                }
            ]
        );
    }

    #[test]
    fn truncation_at_every_offset_never_panics() {
        let full = sample_jpeg();
        for cut in 0..full.len() {
            let header = JpegHeader::parse(&full[..cut], &ParseOptions::exhaustive());
            assert!(header.tables.len() <= 2);
            assert_eq!(header.is_jpeg, cut >= 2);
        }
    }

    #[test]
    fn not_a_jpeg() {
        let header = JpegHeader::parse(b"GIF89a", &ParseOptions::default());
        assert!(!header.is_jpeg);
        assert!(header.tables.is_empty());
        assert_eq!(header.first_exit_code(), Some(ExitCode::NotJpeg));
    }

    #[test]
    fn jpeg_without_tables() {
        let header = JpegHeader::parse(&[0xFF, 0xD8, 0xFF, 0xD9], &ParseOptions::default());
        assert!(header.is_jpeg);
        assert!(header.tables.is_empty());
        assert!(header.roles().luma.is_none());
    }
}
