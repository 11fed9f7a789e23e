//! Third-party variants of the RPA format.

use unrpa_common::Preamble;

use super::{read_preamble, OffsetAndKey, ReadSeek, Version};
use crate::Result;

/// ALT-1.0: `ALT-1.0 <key> <offset>`, with the stored key masked by a
/// fixed constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alt1;

impl Alt1 {
    /// Constant XORed into the key field.
    pub const EXTRA_KEY: u64 = 0xDABE_8DF0;
}

impl Version for Alt1 {
    fn name(&self) -> &'static str {
        "ALT-1.0"
    }

    fn detect(&self, _extension: &str, header: &[u8]) -> bool {
        header.starts_with(b"ALT-1.0")
    }

    fn find_offset_and_key(&self, archive: &mut dyn ReadSeek) -> Result<OffsetAndKey> {
        let line = read_preamble(archive)?;
        let preamble = Preamble::new(&line);

        let key = preamble.hex_field(1)? ^ Self::EXTRA_KEY;
        let offset = preamble.hex_field(2)?;

        Ok(OffsetAndKey::new(offset, Some(key)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_alt1() {
        let header = format!("ALT-1.0 {:08x} {:016x}\n", 0x1234_5678u64 ^ Alt1::EXTRA_KEY, 0x99);
        let mut stream = Cursor::new(header.clone().into_bytes());

        assert!(Alt1.detect("rpa", header.as_bytes()));
        assert!(!Alt1.detect("rpa", b"RPA-3.0 00 00\n"));
        assert_eq!(
            Alt1.find_offset_and_key(&mut stream).unwrap(),
            OffsetAndKey::new(0x99, Some(0x1234_5678))
        );
    }
}
