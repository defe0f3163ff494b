//! Error types for the packed event codec.

use thiserror::Error;

/// Errors that can occur while encoding or decoding packed event files.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad signature, short header or impossible header length.
    #[error("Invalid file format: {0}")]
    Format(String),

    /// The header declares more events than the payload holds.
    #[error("Truncated payload: expected {expected} bytes, found {available}")]
    TruncatedData { expected: u64, available: u64 },

    /// A field does not fit its bit width in the packed layout.
    ///
    /// `index` is the position of the offending event in the input stream,
    /// or `None` for header fields.
    #[error("Field `{field}` out of range: {value}")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        index: Option<usize>,
    },
}
