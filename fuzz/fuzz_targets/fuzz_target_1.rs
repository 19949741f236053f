#![no_main]

use jpeg_qtable_fingerprint::{FileFingerprint, JpegHeader, ParseOptions};

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let header = JpegHeader::parse(data, &ParseOptions::exhaustive());

    let _ = header.roles();
    let _ = header.first_exit_code();

    let quick = FileFingerprint::from_bytes(data, &ParseOptions::default());
    let full = FileFingerprint::from_bytes(data, &ParseOptions::exhaustive());

    // stopping early may only skip segments after everything needed was found
    assert_eq!(quick.header.frame, full.header.frame);
    assert_eq!(quick.fingerprint, full.fingerprint);
});
