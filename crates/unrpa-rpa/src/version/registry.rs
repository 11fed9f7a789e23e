//! Version registry and archive format detection.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use unrpa_common::{read_header_line, MAX_HEADER_LINE};

use super::{Alt1, Rpa1, Rpa2, Rpa3, Rpa91, Version};
use crate::{Error, Result};

/// The set of versions considered during detection.
///
/// Names are unique: registering a version with a name already present
/// replaces the earlier one.
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    versions: Vec<Arc<dyn Version>>,
}

impl VersionRegistry {
    /// A registry with no versions.
    pub fn empty() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    /// A registry with every built-in version.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Rpa1);
        registry.register(Rpa2);
        registry.register(Rpa3::v3_0());
        registry.register(Rpa3::v3_2());
        registry.register(Rpa3::v4_0());
        registry.register(Alt1);
        registry.register(Rpa91::new());
        registry
    }

    /// Add a version.
    pub fn register(&mut self, version: impl Version + 'static) {
        self.register_arc(Arc::new(version));
    }

    /// Add a shared version.
    pub fn register_arc(&mut self, version: Arc<dyn Version>) {
        match self.versions.iter().position(|v| v.name() == version.name()) {
            Some(pos) => self.versions[pos] = version,
            None => self.versions.push(version),
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, version: impl Version + 'static) -> Self {
        self.register(version);
        self
    }

    /// Registered version names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.versions.iter().map(|v| v.name()).collect()
    }

    /// Iterate over registered versions.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Version>> + '_ {
        self.versions.iter()
    }

    /// Look up a version by name, ignoring ASCII case.
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Version>> {
        self.versions
            .iter()
            .find(|v| v.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| Error::UnknownVersion(name.to_string()))
    }

    /// Select the single version claiming `extension` and `header`.
    pub fn detect(&self, extension: &str, header: &[u8]) -> Result<Arc<dyn Version>> {
        let mut matches: Vec<&Arc<dyn Version>> = self
            .versions
            .iter()
            .filter(|v| v.detect(extension, header))
            .collect();

        match matches.len() {
            0 => Err(Error::UnknownArchive {
                header: header.to_vec(),
            }),
            1 => Ok(Arc::clone(matches.remove(0))),
            _ => Err(Error::AmbiguousArchive {
                candidates: matches.iter().map(|v| v.name().to_string()).collect(),
            }),
        }
    }

    /// Detect the version of the archive at `path` from its extension and
    /// header line.
    pub fn detect_file(&self, path: impl AsRef<Path>) -> Result<Arc<dyn Version>> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let mut file = File::open(path)?;
        let header = read_header_line(&mut file, MAX_HEADER_LINE)?;

        let version = self.detect(&extension, &header)?;
        debug!(archive = %path.display(), version = version.name(), "detected archive version");
        Ok(version)
    }
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Detect the version of the archive at `path` among the built-in versions.
pub fn detect_version(path: impl AsRef<Path>) -> Result<Arc<dyn Version>> {
    VersionRegistry::builtin().detect_file(path)
}
