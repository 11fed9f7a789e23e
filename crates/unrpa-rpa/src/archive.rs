//! RPA archive reader.
//!
//! Opening an archive detects its version, locates the index and resolves it
//! into an [`Index`]. Payload bytes are only touched on extraction.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::decompress::inflate_zlib;
use crate::index::{Index, IndexEntry};
use crate::pickle::unpickle_index;
use crate::version::{OffsetAndKey, Version, VersionRegistry};
use crate::view::ArchiveView;
use crate::{Error, Result};

/// Resolve the index of an open archive.
///
/// `override_offset` replaces the version's own preamble parsing, for
/// archives whose offset and key are already known.
pub fn resolve_index<R: Read + Seek + ?Sized>(
    archive: &mut R,
    version: &dyn Version,
    override_offset: Option<OffsetAndKey>,
) -> Result<Index> {
    let OffsetAndKey { offset, key } = match override_offset {
        Some(found) => found,
        None => {
            let mut stream = &mut *archive;
            version.find_offset_and_key(&mut stream)?
        }
    };
    debug!(version = version.name(), offset, key = ?key, "locating index");

    archive.seek(SeekFrom::Start(offset))?;
    let mut compressed = Vec::new();
    archive.read_to_end(&mut compressed)?;

    let pickled = inflate_zlib(&compressed)?;
    let raw = unpickle_index(&pickled)?;
    let index = Index::from_raw(raw, key)?;

    debug!(entries = index.len(), "resolved index");
    Ok(index)
}

/// List the paths of the archive at `archive_path`, sorted.
pub fn list_all(archive_path: impl AsRef<Path>, version: &dyn Version) -> Result<Vec<String>> {
    let mut file = BufReader::new(File::open(archive_path.as_ref())?);
    Ok(resolve_index(&mut file, version, None)?.sorted_paths())
}

/// An RPA archive with its resolved index.
pub struct RpaArchive {
    /// Path of the archive (the index file for split formats).
    path: PathBuf,
    /// Archive file name.
    name: String,
    /// Format handler.
    version: Arc<dyn Version>,
    /// Resolved index.
    index: Index,
}

impl RpaArchive {
    /// Open an archive, detecting its version among the built-in ones.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_in(path, &VersionRegistry::builtin())
    }

    /// Open an archive, detecting its version in `registry`.
    pub fn open_in<P: AsRef<Path>>(path: P, registry: &VersionRegistry) -> Result<Self> {
        let path = path.as_ref();
        let version = registry.detect_file(path)?;
        Self::open_with(path, version, None)
    }

    /// Open an archive with a known version and, optionally, a known index
    /// offset and key.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        version: Arc<dyn Version>,
        override_offset: Option<OffsetAndKey>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut file = BufReader::new(File::open(path)?);
        let index = resolve_index(&mut file, version.as_ref(), override_offset)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            index,
        })
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the archive was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File holding the payload bytes.
    pub fn data_path(&self) -> PathBuf {
        self.version.data_path(&self.path)
    }

    /// The archive's format handler.
    #[inline]
    pub fn version(&self) -> &Arc<dyn Version> {
        &self.version
    }

    /// The resolved index.
    #[inline]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Iterate over entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> + '_ {
        self.index.iter()
    }

    /// All paths, sorted.
    pub fn list(&self) -> Vec<String> {
        self.index.sorted_paths()
    }

    /// Read one stored file into memory, post-processed.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| Error::EntryNotFound(path.to_string()))?;
        let part = entry
            .first()
            .ok_or_else(|| Error::entry(path, "entry has no parts"))?;

        let mut file = BufReader::new(File::open(self.data_path())?);
        let mut view = ArchiveView::new(&mut file, part.offset, part.length, &part.prefix)?;

        let mut data = Vec::new();
        self.version.postprocess(&mut view, &mut data)?;
        Ok(data)
    }
}

impl std::fmt::Debug for RpaArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpaArchive")
            .field("name", &self.name)
            .field("version", &self.version.name())
            .field("entries", &self.index.len())
            .finish()
    }
}
