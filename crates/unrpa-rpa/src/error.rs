//! Error types for the RPA crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when working with RPA archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] unrpa_common::Error),

    /// More than one registered version claims the archive header.
    #[error("ambiguous archive: header matches {}", candidates.join(", "))]
    AmbiguousArchive { candidates: Vec<String> },

    /// No registered version recognizes the archive header.
    #[error("unknown archive format, header: \"{}\"", header.escape_ascii())]
    UnknownArchive { header: Vec<u8> },

    /// A version was requested by name but is not registered.
    #[error("unknown archive version: {0}")]
    UnknownVersion(String),

    /// The extraction root does not exist.
    #[error("output directory not found: {}", .0.display())]
    OutputDirectoryNotFound(PathBuf),

    /// The index could not be inflated, unpickled or normalized.
    #[error("index decode error{}: {reason}", path.as_ref().map(|p| format!(" at {p:?}")).unwrap_or_default())]
    IndexDecode {
        path: Option<String>,
        reason: String,
    },

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// An entry path would escape the output directory.
    #[error("unsafe entry path: {0}")]
    UnsafePath(String),

    /// Extracting a single entry failed.
    #[error("error extracting {path}: {source}")]
    ExtractingFile {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Index decode error not tied to a specific entry.
    pub(crate) fn index(reason: impl Into<String>) -> Self {
        Self::IndexDecode {
            path: None,
            reason: reason.into(),
        }
    }

    /// Index decode error for the entry at `path`.
    pub(crate) fn entry(path: &str, reason: impl Into<String>) -> Self {
        Self::IndexDecode {
            path: Some(path.to_string()),
            reason: reason.into(),
        }
    }
}

/// Result type for RPA operations.
pub type Result<T> = std::result::Result<T, Error>;
