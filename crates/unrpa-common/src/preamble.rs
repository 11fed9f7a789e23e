//! Header line reading and preamble field parsing.
//!
//! Tagged RPA archives start with an ASCII line such as
//! `RPA-3.0 0000000000a1b2c3 42424242\n`. [`Preamble`] gives positional
//! access to that line, either by whitespace separated field or by raw byte
//! range for formats that store fixed-width values.

use std::io::{self, BufRead, BufReader, Read};
use std::ops::Range;

use crate::{Error, Result};

/// Upper bound on the bytes read while looking for the first line terminator.
///
/// Untagged archives (raw zlib streams) may not contain a newline for a long
/// time, so the header line is capped.
pub const MAX_HEADER_LINE: usize = 1024;

/// Read the header line of an archive: bytes up to and including the first
/// `\n`, or at most `limit` bytes if no terminator appears.
///
/// The reader position afterwards is unspecified.
pub fn read_header_line<R: Read + ?Sized>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut buffered = BufReader::new(reader.take(limit as u64));
    buffered.read_until(b'\n', &mut line)?;
    Ok(line)
}

/// Parse a hexadecimal integer the way the archive writers emit it.
///
/// Surrounding ASCII whitespace and an optional `0x` prefix are accepted.
pub fn parse_hex(bytes: &[u8]) -> Result<u64> {
    let invalid = || Error::InvalidHex {
        value: String::from_utf8_lossy(bytes).into_owned(),
    };

    let text = std::str::from_utf8(bytes).map_err(|_| invalid())?.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.is_empty() {
        return Err(invalid());
    }

    u64::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Read-only view over the preamble bytes of an archive.
///
/// # Example
///
/// ```
/// use unrpa_common::Preamble;
///
/// let preamble = Preamble::new(b"RPA-3.0 00000000000000ff 0000000f\n");
///
/// assert!(preamble.starts_with(b"RPA-3.0"));
/// assert_eq!(preamble.hex_field(1).unwrap(), 0xff);
/// assert_eq!(preamble.hex_field(2).unwrap(), 0x0f);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Preamble<'a> {
    data: &'a [u8],
}

impl<'a> Preamble<'a> {
    /// Create a preamble view over raw bytes.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// The raw preamble bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Check whether the preamble begins with `tag`.
    #[inline]
    pub fn starts_with(&self, tag: &[u8]) -> bool {
        self.data.starts_with(tag)
    }

    /// Iterate over the whitespace separated fields.
    pub fn fields(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.data
            .split(|b| b.is_ascii_whitespace())
            .filter(|field| !field.is_empty())
    }

    /// Get a whitespace separated field by position (the tag is field 0).
    pub fn field(&self, index: usize) -> Result<&'a [u8]> {
        self.fields().nth(index).ok_or_else(|| Error::MissingField {
            index,
            available: self.fields().count(),
        })
    }

    /// Parse a whitespace separated field as hexadecimal.
    pub fn hex_field(&self, index: usize) -> Result<u64> {
        parse_hex(self.field(index)?)
    }

    /// XOR together every hex field from `start` to the end of the line.
    ///
    /// Returns zero when there are no such fields.
    pub fn xor_hex_fields(&self, start: usize) -> Result<u64> {
        self.fields()
            .skip(start)
            .try_fold(0u64, |key, field| Ok(key ^ parse_hex(field)?))
    }

    /// Get a fixed byte range of the preamble.
    pub fn range(&self, range: Range<usize>) -> Result<&'a [u8]> {
        if range.end > self.data.len() {
            return Err(Error::UnexpectedEof {
                needed: range.end,
                available: self.data.len(),
            });
        }
        Ok(&self.data[range])
    }

    /// Parse a fixed byte range of the preamble as hexadecimal.
    pub fn hex_range(&self, range: Range<usize>) -> Result<u64> {
        parse_hex(self.range(range)?)
    }
}
