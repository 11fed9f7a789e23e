//! Ren'Py's own archive formats and their close relatives.

use std::path::{Path, PathBuf};

use unrpa_common::Preamble;

use super::{is_tagged, read_preamble, OffsetAndKey, ReadSeek, Version};
use crate::Result;

/// RPA-1.0: a bare `.rpi` index with the payload in a sibling `.rpa` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rpa1;

impl Rpa1 {
    const EXTENSION: &'static str = "rpi";
    const DATA_EXTENSION: &'static str = "rpa";
}

impl Version for Rpa1 {
    fn name(&self) -> &'static str {
        "RPA-1.0"
    }

    fn detect(&self, extension: &str, header: &[u8]) -> bool {
        extension == Self::EXTENSION && !is_tagged(header)
    }

    fn find_offset_and_key(&self, _archive: &mut dyn ReadSeek) -> Result<OffsetAndKey> {
        Ok(OffsetAndKey::new(0, None))
    }

    fn data_path(&self, archive_path: &Path) -> PathBuf {
        archive_path.with_extension(Self::DATA_EXTENSION)
    }
}

/// RPA-2.0: `RPA-2.0 <offset>` with an unobfuscated index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rpa2;

impl Version for Rpa2 {
    fn name(&self) -> &'static str {
        "RPA-2.0"
    }

    fn detect(&self, _extension: &str, header: &[u8]) -> bool {
        header.starts_with(b"RPA-2.0")
    }

    fn find_offset_and_key(&self, archive: &mut dyn ReadSeek) -> Result<OffsetAndKey> {
        let line = read_preamble(archive)?;
        let offset = Preamble::new(&line).hex_field(1)?;
        Ok(OffsetAndKey::new(offset, None))
    }
}

/// RPA-3.0 and the variants sharing its preamble:
/// `<tag> <offset> <key> [<key> ...]`. At least one key field is required;
/// the key is the XOR of all of them.
#[derive(Debug, Clone, Copy)]
pub struct Rpa3 {
    name: &'static str,
    tag: &'static [u8],
}

impl Rpa3 {
    /// The official RPA-3.0 format.
    pub const fn v3_0() -> Self {
        Self {
            name: "RPA-3.0",
            tag: b"RPA-3.0",
        }
    }

    /// RPA-3.2, a lightly customized RPA-3.0.
    pub const fn v3_2() -> Self {
        Self {
            name: "RPA-3.2",
            tag: b"RPA-3.2",
        }
    }

    /// RPA-4.0, a lightly customized RPA-3.0.
    pub const fn v4_0() -> Self {
        Self {
            name: "RPA-4.0",
            tag: b"RPA-4.0",
        }
    }
}

impl Default for Rpa3 {
    fn default() -> Self {
        Self::v3_0()
    }
}

impl Version for Rpa3 {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, _extension: &str, header: &[u8]) -> bool {
        header.starts_with(self.tag)
    }

    fn find_offset_and_key(&self, archive: &mut dyn ReadSeek) -> Result<OffsetAndKey> {
        let line = read_preamble(archive)?;
        let preamble = Preamble::new(&line);

        let offset = preamble.hex_field(1)?;
        let key = preamble.hex_field(2)? ^ preamble.xor_hex_fields(3)?;

        Ok(OffsetAndKey::new(offset, Some(key)))
    }
}
