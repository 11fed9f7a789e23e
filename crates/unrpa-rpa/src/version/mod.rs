//! Archive format versions.
//!
//! Every RPA-family format is a [`Version`]: it recognizes its own header,
//! knows where the index lives and how it is keyed, and post-processes the
//! payload bytes of each stored file. Versions are collected in a
//! [`VersionRegistry`], which selects exactly one for a given archive.

mod alt;
mod official;
mod registry;
mod rpa91;

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use unrpa_common::{read_header_line, MAX_HEADER_LINE};

use crate::Result;

pub use alt::Alt1;
pub use official::{Rpa1, Rpa2, Rpa3};
pub use registry::{detect_version, VersionRegistry};
pub use rpa91::Rpa91;

/// Object-safe `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Location of the index and the key its entries are obfuscated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetAndKey {
    /// Absolute offset of the compressed index.
    pub offset: u64,
    /// XOR key for entry offsets and lengths, if the index is obfuscated.
    pub key: Option<u64>,
}

impl OffsetAndKey {
    /// Create a new offset/key pair.
    pub const fn new(offset: u64, key: Option<u64>) -> Self {
        Self { offset, key }
    }
}

impl From<(u64, Option<u64>)> for OffsetAndKey {
    fn from((offset, key): (u64, Option<u64>)) -> Self {
        Self { offset, key }
    }
}

/// A handler for one archive format.
pub trait Version: fmt::Debug + Send + Sync {
    /// Display name, e.g. `RPA-3.0`.
    fn name(&self) -> &'static str;

    /// Whether this format claims an archive with the given lowercase
    /// `extension` (without dot) and first `header` line.
    fn detect(&self, extension: &str, header: &[u8]) -> bool;

    /// Read the preamble and locate the index.
    ///
    /// The stream position afterwards is unspecified; callers seek to the
    /// returned offset.
    fn find_offset_and_key(&self, archive: &mut dyn ReadSeek) -> Result<OffsetAndKey>;

    /// Write one stored file from `source` to `sink`, returning the number of
    /// bytes written. The default copies bytes unchanged.
    fn postprocess(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64> {
        Ok(io::copy(source, sink)?)
    }

    /// The file holding the payload bytes. Usually the archive itself.
    fn data_path(&self, archive_path: &Path) -> PathBuf {
        archive_path.to_path_buf()
    }
}

/// Whether `header` starts with a format tag such as `RPA-3.0` or `ALT-1.0`.
pub(crate) fn is_tagged(header: &[u8]) -> bool {
    header.len() >= 4 && header[..3].iter().all(u8::is_ascii_alphanumeric) && header[3] == b'-'
}

/// Read the first line of the archive.
pub(crate) fn read_preamble(archive: &mut dyn ReadSeek) -> Result<Vec<u8>> {
    archive.seek(SeekFrom::Start(0))?;
    Ok(read_header_line(archive, MAX_HEADER_LINE)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged(b"RPA-3.0 0000"));
        assert!(is_tagged(b"ALT-1.0"));
        assert!(is_tagged(b"ZiX-12A"));
        assert!(!is_tagged(&[0x78, 0x9c, 0x01, 0x02]));
        assert!(!is_tagged(b"RPA"));
        assert!(!is_tagged(b""));
    }
}
