/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ByteOrder};

use crate::fingerprint_error::ExitCode;

use super::jpeg_code;

/// What a marker segment is, without interpreting its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    StartOfImage,
    EndOfImage,
    /// SOF0 (baseline) or SOF2 (progressive), the only frame types we interpret
    StartOfFrame { progressive: bool },
    /// any other SOFn (extended, lossless, hierarchical, arithmetic)
    OtherFrame(u8),
    DefineQuantizationTable,
    DefineHuffmanTable,
    DefineRestartInterval,
    StartOfScan,
    Restart(u8),
    Application(u8),
    Comment,
    Other(u8),
}

impl SegmentKind {
    pub fn from_marker(marker: u8) -> Self {
        match marker {
            jpeg_code::SOI => SegmentKind::StartOfImage,
            jpeg_code::EOI => SegmentKind::EndOfImage,
            jpeg_code::SOF0 => SegmentKind::StartOfFrame { progressive: false },
            jpeg_code::SOF2 => SegmentKind::StartOfFrame { progressive: true },
            // 0xC4, 0xC8 and 0xCC share the SOF range but are DHT, JPG and DAC
            jpeg_code::DHT => SegmentKind::DefineHuffmanTable,
            jpeg_code::SOF1 | 0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                SegmentKind::OtherFrame(marker)
            }
            jpeg_code::DQT => SegmentKind::DefineQuantizationTable,
            jpeg_code::DRI => SegmentKind::DefineRestartInterval,
            jpeg_code::SOS => SegmentKind::StartOfScan,
            jpeg_code::RST0..=jpeg_code::RST7 => SegmentKind::Restart(marker - jpeg_code::RST0),
            jpeg_code::APP0..=jpeg_code::APP15 => SegmentKind::Application(marker - jpeg_code::APP0),
            jpeg_code::COM => SegmentKind::Comment,
            _ => SegmentKind::Other(marker),
        }
    }
}

/// A single marker segment as found in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSegment<'a> {
    /// marker type byte (the byte following 0xFF)
    pub marker: u8,

    /// offset of the 0xFF byte that introduced the marker
    pub offset: usize,

    /// segment payload, excluding the two length bytes. Empty for standalone markers.
    pub payload: &'a [u8],
}

impl MarkerSegment<'_> {
    pub fn kind(&self) -> SegmentKind {
        SegmentKind::from_marker(self.marker)
    }
}

/// Why the scanner stopped producing segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    /// buffer shorter than the two bytes of a Start-Of-Image marker
    ShortRead,
    /// buffer does not start with 0xFFD8
    MissingStartOfImage,
    /// End-Of-Image marker was reached
    EndOfImage,
    /// ran out of bytes between segments, typically a truncated file without EOI
    EndOfData,
    /// marker at `offset` has no room for its two length bytes
    TruncatedLength { marker: u8, offset: usize },
    /// marker at `offset` declared a length below 2 or past the end of the buffer
    MalformedLength {
        marker: u8,
        offset: usize,
        length: u16,
    },
}

impl ScanStop {
    /// true if the stop was caused by damaged structure rather than a normal end
    pub fn is_structural_error(&self) -> bool {
        !matches!(self, ScanStop::EndOfImage | ScanStop::EndOfData)
    }

    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            ScanStop::ShortRead => Some(ExitCode::ShortRead),
            ScanStop::MissingStartOfImage => Some(ExitCode::NotJpeg),
            ScanStop::TruncatedLength { .. } | ScanStop::MalformedLength { .. } => {
                Some(ExitCode::MalformedSegment)
            }
            ScanStop::EndOfImage | ScanStop::EndOfData => None,
        }
    }
}

/// Walks a byte buffer and yields the marker segments it contains.
///
/// The scanner never interprets payloads and never fails: a damaged length field
/// simply ends the iteration, and `stop_reason` tells the caller why. Bytes between
/// segments (entropy coded scan data, fill bytes, garbage) are skipped by searching
/// for the next 0xFF that is not followed by a stuffed zero.
pub struct MarkerScanner<'a> {
    data: &'a [u8],
    pos: usize,
    stop: Option<ScanStop>,
}

impl<'a> MarkerScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let stop = if data.len() < 2 {
            Some(ScanStop::ShortRead)
        } else if data[0] != jpeg_code::MARKER_PREFIX || data[1] != jpeg_code::SOI {
            Some(ScanStop::MissingStartOfImage)
        } else {
            None
        };

        MarkerScanner { data, pos: 0, stop }
    }

    /// true if the buffer starts with a Start-Of-Image marker
    pub fn is_jpeg(&self) -> bool {
        !matches!(
            self.stop,
            Some(ScanStop::ShortRead) | Some(ScanStop::MissingStartOfImage)
        )
    }

    /// reason the scan ended, `None` while segments may still be produced
    pub fn stop_reason(&self) -> Option<ScanStop> {
        self.stop
    }

    /// offset of the next byte the scanner will look at
    pub fn position(&self) -> usize {
        self.pos
    }

    fn finish(&mut self, reason: ScanStop) {
        self.stop = Some(reason);
    }
}

impl<'a> Iterator for MarkerScanner<'a> {
    type Item = MarkerSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop.is_some() {
            return None;
        }

        let data = self.data;
        let len = data.len();

        loop {
            // advance to the next marker prefix
            while self.pos < len && data[self.pos] != jpeg_code::MARKER_PREFIX {
                self.pos += 1;
            }

            // any run of 0xFF is fill, the last one is the real prefix
            while self.pos < len && data[self.pos] == jpeg_code::MARKER_PREFIX {
                self.pos += 1;
            }

            if self.pos >= len {
                self.finish(ScanStop::EndOfData);
                return None;
            }

            let marker = data[self.pos];
            let offset = self.pos - 1;
            self.pos += 1;

            // 0xFF00 is a stuffed 0xFF inside entropy coded data
            if marker == 0x00 {
                continue;
            }

            if jpeg_code::is_standalone(marker) {
                if marker == jpeg_code::EOI {
                    self.finish(ScanStop::EndOfImage);
                }

                return Some(MarkerSegment {
                    marker,
                    offset,
                    payload: &[],
                });
            }

            if self.pos + 2 > len {
                self.finish(ScanStop::TruncatedLength { marker, offset });
                return None;
            }

            // length includes the two length bytes themselves
            let length = BigEndian::read_u16(&data[self.pos..self.pos + 2]);
            let segment_end = self.pos + usize::from(length);
            if length < 2 || segment_end > len {
                self.finish(ScanStop::MalformedLength {
                    marker,
                    offset,
                    length,
                });
                return None;
            }

            let payload = &data[self.pos + 2..segment_end];
            self.pos = segment_end;

            return Some(MarkerSegment {
                marker,
                offset,
                payload,
            });
        }
    }
}
