//! RPA-9.1: obfuscated preamble plus an XOR payload cipher.

use std::io::{Read, Write};

use unrpa_common::Preamble;

use super::{OffsetAndKey, ReadSeek, Version};
use crate::crypto::xor_stream;
use crate::Result;

/// RPA-9.1.
///
/// The preamble is a fixed 40 byte block; bytes 8..24 hold the index offset
/// in hex, masked with [`Rpa91::OFFSET_MASK`]. The index key is fixed, and
/// every payload byte is XORed with [`Rpa91::MAGIC`] cycling from the start
/// of each file.
#[derive(Debug, Clone)]
pub struct Rpa91 {
    magic: [u8; 32],
}

impl Rpa91 {
    /// Size of the preamble block.
    pub const PREAMBLE_SIZE: u64 = 40;
    /// Mask applied to the stored offset.
    pub const OFFSET_MASK: u64 = 0x46D9_6FA8_FAD5_262B;
    /// Key for index entries.
    pub const KEY: u64 = 0x126E_6680;
    /// Payload cipher sequence.
    pub const MAGIC: [u8; 32] = [
        0xF6, 0x02, 0x3F, 0x76, 0x4D, 0x0B, 0x80, 0x1B, 0x29, 0x10, 0xDF, 0xDD, 0x74, 0x85, 0xDE,
        0xA6, 0xDB, 0x7D, 0xC8, 0x19, 0xBA, 0xE3, 0xD0, 0x63, 0x2F, 0x50, 0xE7, 0x55, 0xB4, 0x67,
        0x0B, 0xFB,
    ];

    /// Create the handler with its cipher table.
    pub const fn new() -> Self {
        Self { magic: Self::MAGIC }
    }
}

impl Default for Rpa91 {
    fn default() -> Self {
        Self::new()
    }
}

impl Version for Rpa91 {
    fn name(&self) -> &'static str {
        "RPA-9.1"
    }

    fn detect(&self, _extension: &str, header: &[u8]) -> bool {
        header.starts_with(b"RPA-9.1")
    }

    fn find_offset_and_key(&self, archive: &mut dyn ReadSeek) -> Result<OffsetAndKey> {
        archive.seek(std::io::SeekFrom::Start(0))?;

        let mut block = Vec::with_capacity(Self::PREAMBLE_SIZE as usize);
        archive.take(Self::PREAMBLE_SIZE).read_to_end(&mut block)?;

        let offset = Preamble::new(&block).hex_range(8..24)? ^ Self::OFFSET_MASK;
        Ok(OffsetAndKey::new(offset, Some(Self::KEY)))
    }

    fn postprocess(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64> {
        Ok(xor_stream(&self.magic, source, sink)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_find_offset_and_key() {
        let header = format!("RPA-9.1 {:016x} {:08x}\n", 0x5000u64 ^ Rpa91::OFFSET_MASK, 0);
        let mut stream = Cursor::new(header.into_bytes());

        assert_eq!(
            Rpa91::new().find_offset_and_key(&mut stream).unwrap(),
            OffsetAndKey::new(0x5000, Some(Rpa91::KEY))
        );
    }

    #[test]
    fn test_short_preamble() {
        let mut stream = Cursor::new(b"RPA-9.1 0000".to_vec());
        assert!(Rpa91::new().find_offset_and_key(&mut stream).is_err());
    }

    #[test]
    fn test_postprocess_cycles_magic() {
        let plain: Vec<u8> = (0u8..70).collect();
        let mut out = Vec::new();

        let written = Rpa91::new()
            .postprocess(&mut plain.as_slice(), &mut out)
            .unwrap();

        assert_eq!(written, 70);
        for (i, (&p, &c)) in plain.iter().zip(&out).enumerate() {
            assert_eq!(c, p ^ Rpa91::MAGIC[i % 32]);
        }
    }
}
