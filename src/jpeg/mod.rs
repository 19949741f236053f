//! Reading of JPEG headers without decoding the image.
//!
//! Only the marker segments are walked. The frame header and the quantization tables
//! are interpreted, everything else (including the entropy coded scan data) is skipped.

mod frame_header;
mod marker_scanner;
mod parse_warning;
mod quantization_table;

pub mod jpeg_code;
pub mod jpeg_header;

pub use frame_header::{parse_frame_header, FrameComponent, FrameMetadata, JpegMeta, Subsampling};
pub use marker_scanner::{MarkerScanner, MarkerSegment, ScanStop, SegmentKind};
pub use parse_warning::ParseWarning;
pub use quantization_table::{
    parse_dqt_segment, select_roles, Precision, QuantizationMatrix, QuantizationTable,
    SelectedTable, TableRoles,
};
