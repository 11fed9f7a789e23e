//! Bounded, prefixed read window over an archive stream.

use std::io::{self, Read, Seek, SeekFrom};

/// A sequential reader over one file stored in an archive.
///
/// The view first yields the inline `prefix` stored in the index, then bytes
/// from the archive starting at `offset`. At most `length` bytes are produced
/// in total, prefix included, matching how Ren'Py counts entry lengths.
///
/// The view borrows the archive stream mutably, so nothing else can move the
/// cursor while it is alive. Nothing is buffered beyond the caller's reads.
#[derive(Debug)]
pub struct ArchiveView<'a, R: ?Sized> {
    reader: &'a mut R,
    prefix: &'a [u8],
    prefix_pos: usize,
    remaining: u64,
}

impl<'a, R: Read + Seek + ?Sized> ArchiveView<'a, R> {
    /// Create a view and position the stream at `offset`.
    pub fn new(reader: &'a mut R, offset: u64, length: u64, prefix: &'a [u8]) -> io::Result<Self> {
        let prefix_len = usize::try_from(length).map_or(prefix.len(), |len| len.min(prefix.len()));
        reader.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            reader,
            prefix: &prefix[..prefix_len],
            prefix_pos: 0,
            remaining: length,
        })
    }
}

impl<R: ?Sized> ArchiveView<'_, R> {
    /// Logical bytes left to read.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Whether the view has been fully drained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl<R: Read + ?Sized> Read for ArchiveView<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.remaining == 0 {
            return Ok(0);
        }

        let cap = usize::try_from(self.remaining).map_or(buf.len(), |rem| rem.min(buf.len()));

        if self.prefix_pos < self.prefix.len() {
            let pending = &self.prefix[self.prefix_pos..];
            let n = pending.len().min(cap);
            buf[..n].copy_from_slice(&pending[..n]);
            self.prefix_pos += n;
            self.remaining -= n as u64;
            return Ok(n);
        }

        let n = self.reader.read(&mut buf[..cap])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive ended with {} bytes of the entry unread", self.remaining),
            ));
        }

        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn archive() -> Cursor<Vec<u8>> {
        Cursor::new((0u8..=255).collect())
    }

    #[test]
    fn test_reads_bounded_range() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 100, 10, b"").unwrap();

        let mut out = Vec::new();
        view.read_to_end(&mut out).unwrap();

        assert_eq!(out, (100u8..110).collect::<Vec<_>>());
        assert!(view.is_empty());
    }

    #[test]
    fn test_prefix_counts_toward_length() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 4, 5, b"ab").unwrap();

        let mut out = Vec::new();
        view.read_to_end(&mut out).unwrap();

        assert_eq!(out, vec![b'a', b'b', 4, 5, 6]);
    }

    #[test]
    fn test_prefix_longer_than_length() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 0, 2, b"abcdef").unwrap();

        let mut out = Vec::new();
        view.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_small_reads() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 10, 5, b"x").unwrap();

        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = view.read(&mut byte).unwrap();
            if n == 0 {
                break;
            }
            out.push(byte[0]);
        }

        assert_eq!(out, vec![b'x', 10, 11, 12, 13]);
    }

    #[test]
    fn test_truncated_archive() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 250, 10, b"").unwrap();

        let mut out = Vec::new();
        let err = view.read_to_end(&mut out).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(out, vec![250, 251, 252, 253, 254, 255]);
    }

    #[test]
    fn test_zero_length() {
        let mut stream = archive();
        let mut view = ArchiveView::new(&mut stream, 0, 0, b"ignored").unwrap();

        let mut out = Vec::new();
        view.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
