//! Error types for unrpa-common.

use thiserror::Error;

/// Common error type for preamble parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// End of the preamble reached while reading.
    #[error("unexpected end of preamble: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A whitespace separated field is missing.
    #[error("missing preamble field {index}: only {available} fields present")]
    MissingField { index: usize, available: usize },

    /// A field could not be parsed as a hexadecimal integer.
    #[error("invalid hexadecimal value {value:?}")]
    InvalidHex { value: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
