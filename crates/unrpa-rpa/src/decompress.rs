//! Decompression of the archive index.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{Error, Result};

/// Inflate a zlib stream, as written by Python's `zlib.compress`.
pub fn inflate_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|e| Error::index(format!("zlib: {e}")))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_roundtrip() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"Hello, World! This is a test of zlib compression.";

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate_zlib(&compressed).unwrap(), original);
    }

    #[test]
    fn test_garbage_is_index_error() {
        let err = inflate_zlib(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, Error::IndexDecode { path: None, .. }));
    }
}
