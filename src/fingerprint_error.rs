/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;
use std::io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[non_exhaustive]
/// Well-defined errors for bad things that are expected to happen while extracting,
/// building or matching quantization fingerprints.
pub enum ExitCode {
    /// A worker panicked, which probably indicates a bug in the library.
    AssertionFailure = 1,

    /// The buffer is too short to contain a Start-Of-Image marker.
    ShortRead = 3,

    /// A marker segment declared a length that is too small or runs past the end of the buffer.
    MalformedSegment = 4,

    /// A DQT sub-table ended before all 64 coefficients were present.
    TruncatedTable = 5,

    /// The input does not start with a Start-Of-Image marker.
    NotJpeg = 6,

    /// An error was returned by an IO operation, for example a file that could not be read.
    OsError = 33,

    /// A worker could not deliver its result back to the caller.
    ChannelFailure = 103,

    /// The database file carries a schema tag this version does not understand.
    SchemaMismatch = 104,

    /// The database file is not valid JSON or has an unexpected shape.
    InvalidDatabase = 105,

    /// Caller passed in invalid parameters
    SyntaxError = 1006,

    /// The dataset directory or input file was not found
    FileNotFound = 1007,
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ExitCode {
    /// Converts the error code into an integer for use as a process exit code.
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }
}

/// Since errors are rare and stop everything, we want them to be as lightweight as possible.
#[derive(Debug, Clone)]
struct FingerprintErrorInternal {
    exit_code: ExitCode,
    message: String,
}

/// Standard error returned by the fingerprint library
#[derive(Debug, Clone)]
pub struct FingerprintError {
    i: Box<FingerprintErrorInternal>,
}

pub type Result<T> = std::result::Result<T, FingerprintError>;

impl Display for FingerprintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.i.exit_code, self.i.message)
    }
}

impl FingerprintError {
    /// Creates a new FingerprintError with the specified exit code and message.
    pub fn new(exit_code: ExitCode, message: impl AsRef<str>) -> FingerprintError {
        FingerprintError {
            i: Box::new(FingerprintErrorInternal {
                exit_code,
                message: message.as_ref().to_owned(),
            }),
        }
    }

    /// Returns the exit code that classifies the error
    pub fn exit_code(&self) -> ExitCode {
        self.i.exit_code
    }

    /// Returns the human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.i.message
    }

    /// Adds context to the error by appending the current location in the code. This
    /// allows for building a callstack of where the error occurred.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn add_context(&mut self) {
        self.i
            .message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    let mut e = FingerprintError::new(error_code, message.as_ref());
    e.add_context();
    return Err(e);
}

pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<FingerprintError>> AddContext<T> for core::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e = e.into();
                e.add_context();
                Err(e)
            }
        }
    }
}

impl std::error::Error for FingerprintError {}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::NotFound => ExitCode::FileNotFound,
        ErrorKind::UnexpectedEof => ExitCode::ShortRead,
        _ => ExitCode::OsError,
    }
}

/// translates std::io::Error into FingerprintError
impl From<std::io::Error> for FingerprintError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        let mut e = FingerprintError::new(get_io_error_exit_code(&e), e.to_string());
        e.add_context();
        e
    }
}

impl From<walkdir::Error> for FingerprintError {
    #[track_caller]
    fn from(e: walkdir::Error) -> Self {
        let exit_code = e
            .io_error()
            .map(get_io_error_exit_code)
            .unwrap_or(ExitCode::OsError);

        let mut e = FingerprintError::new(exit_code, e.to_string());
        e.add_context();
        e
    }
}

impl From<serde_json::Error> for FingerprintError {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        let exit_code = if e.is_io() {
            ExitCode::OsError
        } else {
            ExitCode::InvalidDatabase
        };

        let mut e = FingerprintError::new(exit_code, e.to_string());
        e.add_context();
        e
    }
}

impl From<pico_args::Error> for FingerprintError {
    #[track_caller]
    fn from(e: pico_args::Error) -> Self {
        let mut e = FingerprintError::new(ExitCode::SyntaxError, e.to_string());
        e.add_context();
        e
    }
}

impl<T> From<std::sync::mpsc::SendError<T>> for FingerprintError {
    #[track_caller]
    fn from(e: std::sync::mpsc::SendError<T>) -> Self {
        let mut e = FingerprintError::new(ExitCode::ChannelFailure, e.to_string());
        e.add_context();
        e
    }
}

impl From<std::sync::mpsc::RecvError> for FingerprintError {
    #[track_caller]
    fn from(e: std::sync::mpsc::RecvError) -> Self {
        let mut e = FingerprintError::new(ExitCode::ChannelFailure, e.to_string());
        e.add_context();
        e
    }
}

/// translates FingerprintError into std::io::Error, which involves putting into a Box and using Other
impl From<FingerprintError> for std::io::Error {
    fn from(e: FingerprintError) -> Self {
        return std::io::Error::new(std::io::ErrorKind::Other, e);
    }
}

#[test]
fn test_error_translation() {
    // a missing file is reported as such so the dataset pre-flight check can be distinguished
    let e: FingerprintError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code(), ExitCode::FileNotFound);

    // any other IO error is an OsError
    let e: FingerprintError =
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert_eq!(e.exit_code(), ExitCode::OsError);

    let e: FingerprintError = serde_json::from_str::<u32>("{").unwrap_err().into();
    assert_eq!(e.exit_code(), ExitCode::InvalidDatabase);
}

#[test]
fn test_context_appends_location() {
    let r: Result<()> = err_exit_code(ExitCode::SyntaxError, "bad switch");
    let e = r.unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::SyntaxError);
    assert!(e.message().starts_with("bad switch\n at "));
    assert!(e.message().contains("fingerprint_error.rs"));
}
