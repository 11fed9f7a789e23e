//! Payload cipher for XOR-obfuscated archive variants.
//!
//! Some archive variants XOR every payload byte against a short repeating
//! magic sequence. The position is counted from the start of each stored file,
//! so the cipher state carries across read chunks and is recreated per file.

use std::io::{self, Read, Write};

/// Read size used when streaming a payload through the cipher.
const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming XOR against a cycling magic sequence.
#[derive(Debug, Clone)]
pub struct XorCipher<'a> {
    magic: &'a [u8],
    position: u64,
}

impl<'a> XorCipher<'a> {
    /// Create a cipher positioned at the start of a file.
    ///
    /// An empty magic sequence leaves data unchanged.
    pub const fn new(magic: &'a [u8]) -> Self {
        Self { magic, position: 0 }
    }

    /// Logical position of the next byte to be processed.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// XOR a chunk in place, continuing from the current position.
    pub fn apply(&mut self, data: &mut [u8]) {
        if !self.magic.is_empty() {
            let phase = (self.position % self.magic.len() as u64) as usize;
            let key = self.magic.iter().cycle().skip(phase);
            for (byte, k) in data.iter_mut().zip(key) {
                *byte ^= k;
            }
        }
        self.position += data.len() as u64;
    }
}

/// Stream `source` into `sink` through a fresh [`XorCipher`].
///
/// Reads until the source reports end of data and returns the number of bytes
/// written. Chunk boundaries have no effect on the output.
pub fn xor_stream(
    magic: &[u8],
    source: &mut (impl Read + ?Sized),
    sink: &mut (impl Write + ?Sized),
) -> io::Result<u64> {
    let mut cipher = XorCipher::new(magic);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let chunk = &mut buffer[..n];
        cipher.apply(chunk);
        sink.write_all(chunk)?;
    }

    Ok(cipher.position())
}
