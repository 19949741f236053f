/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::panic::{catch_unwind, AssertUnwindSafe};

use sha2::{Digest, Sha256};

use crate::fingerprint_error::{ExitCode, FingerprintError};

/// Helper function to catch panics and convert them into the appropriate FingerprintError
pub fn catch_unwind_result<R>(
    f: impl FnOnce() -> Result<R, FingerprintError>,
) -> Result<R, FingerprintError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(err) => {
            if let Some(message) = err.downcast_ref::<&str>() {
                Err(FingerprintError::new(ExitCode::AssertionFailure, *message))
            } else if let Some(message) = err.downcast_ref::<String>() {
                Err(FingerprintError::new(ExitCode::AssertionFailure, message))
            } else {
                Err(FingerprintError::new(
                    ExitCode::AssertionFailure,
                    "unknown panic",
                ))
            }
        }
    }
}

/// high nibble of a byte, used for precision/class and horizontal sampling factors
#[inline(always)]
pub const fn lbits(c: u8, n: usize) -> u8 {
    return c >> (8 - n);
}

/// low nibble of a byte, used for table ids and vertical sampling factors
#[inline(always)]
pub const fn rbits(c: u8, n: usize) -> u8 {
    return c & (0xFF >> (8 - n));
}

/// lowercase hex SHA-256 of a buffer
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[test]
fn nibble_split() {
    assert_eq!(lbits(0x21, 4), 2);
    assert_eq!(rbits(0x21, 4), 1);
    assert_eq!(lbits(0x1F, 4), 1);
    assert_eq!(rbits(0x1F, 4), 15);
}

#[test]
fn sha256_known_vector() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn panic_becomes_assertion_failure() {
    let r: Result<(), FingerprintError> = catch_unwind_result(|| panic!("worker exploded"));
    let e = r.unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::AssertionFailure);
    assert_eq!(e.message(), "worker exploded");
}
