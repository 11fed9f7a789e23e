//! Extraction of archive entries to a directory tree.
//!
//! Each entry is streamed through an [`ArchiveView`] and the version's
//! post-processor into its own output file. Output files are opened with
//! truncation; a file whose extraction fails may be left empty or partially
//! written.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};

use crate::archive::{resolve_index, RpaArchive};
use crate::index::{Index, IndexEntry};
use crate::version::Version;
use crate::view::ArchiveView;
use crate::{Error, Result};

/// Extraction settings.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Record per-file failures and keep going instead of aborting.
    pub continue_on_error: bool,
    /// Only extract paths matching this pattern.
    pub filter: Option<Pattern>,
}

impl ExtractOptions {
    /// Default options: abort on the first failure, extract everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the continue-on-error policy.
    #[must_use]
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Restrict extraction to paths matching `pattern`.
    #[must_use]
    pub fn filter(mut self, pattern: Pattern) -> Self {
        self.filter = Some(pattern);
        self
    }

    fn selects(&self, path: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches_path(Path::new(path)))
    }
}

/// A file that could not be extracted.
#[derive(Debug)]
pub struct ExtractFailure {
    /// Archive path of the entry.
    pub path: String,
    /// What went wrong.
    pub error: Error,
}

/// Outcome of an extraction run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Files written successfully.
    pub extracted: usize,
    /// Entries excluded by the filter.
    pub skipped: usize,
    /// Bytes written across all successful files.
    pub bytes: u64,
    /// Files that failed under continue-on-error.
    pub failures: Vec<ExtractFailure>,
}

impl ExtractReport {
    /// Whether every selected file was extracted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &str, result: Result<u64>, continue_on_error: bool) -> Result<()> {
        match result {
            Ok(bytes) => {
                debug!(path, bytes, "extracted");
                self.extracted += 1;
                self.bytes += bytes;
                Ok(())
            }
            Err(error) if continue_on_error => {
                warn!(path, %error, "failed to extract, continuing");
                self.failures.push(ExtractFailure {
                    path: path.to_string(),
                    error,
                });
                Ok(())
            }
            Err(error) => Err(Error::ExtractingFile {
                path: path.to_string(),
                source: Box::new(error),
            }),
        }
    }
}

/// Fail unless the extraction root exists.
fn ensure_output_root(output_root: &Path) -> Result<()> {
    if output_root.is_dir() {
        Ok(())
    } else {
        Err(Error::OutputDirectoryNotFound(output_root.to_path_buf()))
    }
}

/// Join an archive path onto the output root, refusing paths that would
/// leave it.
fn destination(output_root: &Path, path: &str) -> Result<PathBuf> {
    let mut target = output_root.to_path_buf();
    let mut named = false;

    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                named = true;
            }
            Component::CurDir => {}
            _ => return Err(Error::UnsafePath(path.to_string())),
        }
    }

    if named {
        Ok(target)
    } else {
        Err(Error::UnsafePath(path.to_string()))
    }
}

/// Extract a single entry to `output_root/path`.
fn extract_entry<R: Read + Seek + ?Sized>(
    archive: &mut R,
    version: &dyn Version,
    output_root: &Path,
    path: &str,
    entry: &IndexEntry,
) -> Result<u64> {
    let part = entry
        .first()
        .ok_or_else(|| Error::entry(path, "entry has no parts"))?;
    let target = destination(output_root, path)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut view = ArchiveView::new(archive, part.offset, part.length, &part.prefix)?;
    let mut sink = BufWriter::new(File::create(&target)?);

    let written = version.postprocess(&mut view, &mut sink)?;
    sink.flush()?;

    Ok(written)
}

/// Extract every entry of `index` from an open payload stream.
///
/// Entries are processed in index order. `progress` is called with each
/// path before it is extracted.
pub fn extract_index<R, F>(
    archive: &mut R,
    index: &Index,
    version: &dyn Version,
    output_root: &Path,
    options: &ExtractOptions,
    mut progress: F,
) -> Result<ExtractReport>
where
    R: Read + Seek + ?Sized,
    F: FnMut(&str),
{
    ensure_output_root(output_root)?;

    let mut report = ExtractReport::default();
    for (path, entry) in index.iter() {
        if !options.selects(path) {
            report.skipped += 1;
            continue;
        }

        progress(path);
        let result = extract_entry(archive, version, output_root, path, entry);
        report.record(path, result, options.continue_on_error)?;
    }

    info!(
        extracted = report.extracted,
        failed = report.failures.len(),
        skipped = report.skipped,
        "extraction finished"
    );
    Ok(report)
}

/// Extract every file of the archive at `archive_path` into `output_root`.
///
/// The archive is opened and its index resolved once. `output_root` must
/// already exist.
pub fn extract_all(
    archive_path: impl AsRef<Path>,
    output_root: impl AsRef<Path>,
    version: &dyn Version,
    continue_on_error: bool,
) -> Result<ExtractReport> {
    let archive_path = archive_path.as_ref();
    let output_root = output_root.as_ref();
    ensure_output_root(output_root)?;

    let mut archive = BufReader::new(File::open(archive_path)?);
    let index = resolve_index(&mut archive, version, None)?;
    let options = ExtractOptions::new().continue_on_error(continue_on_error);

    let data_path = version.data_path(archive_path);
    if data_path == archive_path {
        extract_index(&mut archive, &index, version, output_root, &options, |_| {})
    } else {
        let mut data = BufReader::new(File::open(&data_path)?);
        extract_index(&mut data, &index, version, output_root, &options, |_| {})
    }
}

impl RpaArchive {
    /// Extract all selected entries into `output_root`.
    pub fn extract_all(&self, output_root: impl AsRef<Path>, options: &ExtractOptions) -> Result<ExtractReport> {
        self.extract_with(output_root, options, |_| {})
    }

    /// Extract all selected entries, reporting each path to `progress`.
    pub fn extract_with<F: FnMut(&str)>(
        &self,
        output_root: impl AsRef<Path>,
        options: &ExtractOptions,
        progress: F,
    ) -> Result<ExtractReport> {
        let output_root = output_root.as_ref();
        ensure_output_root(output_root)?;

        let mut data = BufReader::new(File::open(self.data_path())?);
        extract_index(
            &mut data,
            self.index(),
            self.version().as_ref(),
            output_root,
            options,
            progress,
        )
    }

    /// Parallel extraction. Every worker reads through its own file handle.
    ///
    /// The failure policy matches [`extract_with`](Self::extract_with), but
    /// without continue-on-error other entries may already have been written
    /// when the first failure (in index order) is returned.
    #[cfg(feature = "parallel")]
    pub fn extract_parallel<F>(
        &self,
        output_root: impl AsRef<Path>,
        options: &ExtractOptions,
        progress: F,
    ) -> Result<ExtractReport>
    where
        F: Fn(&str) + Sync,
    {
        use rayon::prelude::*;

        let output_root = output_root.as_ref();
        ensure_output_root(output_root)?;

        let data_path = self.data_path();
        let version = self.version().as_ref();

        let mut report = ExtractReport::default();
        let mut selected = Vec::with_capacity(self.entry_count());
        for (path, entry) in self.iter() {
            if options.selects(path) {
                selected.push((path, entry));
            } else {
                report.skipped += 1;
            }
        }

        let results: Vec<(&str, Result<u64>)> = selected
            .par_iter()
            .map_init(
                || File::open(&data_path).map(BufReader::new),
                |file, &(path, entry)| {
                    progress(path);
                    let result = match file {
                        Ok(file) => extract_entry(file, version, output_root, path, entry),
                        Err(e) => Err(Error::Io(std::io::Error::new(e.kind(), e.to_string()))),
                    };
                    (path, result)
                },
            )
            .collect();

        for (path, result) in results {
            report.record(path, result, options.continue_on_error)?;
        }

        info!(
            extracted = report.extracted,
            failed = report.failures.len(),
            skipped = report.skipped,
            "parallel extraction finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_joins_normal_components() {
        let root = Path::new("out");
        let path = format!("a{}b.txt", std::path::MAIN_SEPARATOR);
        assert_eq!(destination(root, &path).unwrap(), root.join("a").join("b.txt"));
        assert_eq!(destination(root, "./c.txt").unwrap(), root.join("c.txt"));
    }

    #[test]
    fn test_destination_rejects_escapes() {
        let root = Path::new("out");
        for path in ["../evil.txt", "a/../../evil.txt", "/etc/passwd", "", "."] {
            assert!(
                matches!(destination(root, path), Err(Error::UnsafePath(_))),
                "{path:?}"
            );
        }
    }

    #[test]
    fn test_filter_selection() {
        let options = ExtractOptions::new().filter(Pattern::new("images/*.png").unwrap());
        assert!(options.selects("images/bg.png"));
        assert!(!options.selects("script.rpyc"));
        assert!(ExtractOptions::new().selects("anything"));
    }

    #[test]
    fn test_report_policy() {
        let mut report = ExtractReport::default();
        report.record("a", Ok(3), false).unwrap();
        report
            .record("b", Err(Error::UnsafePath("b".into())), true)
            .unwrap();

        assert_eq!(report.extracted, 1);
        assert_eq!(report.bytes, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_complete());

        let err = report
            .record("c", Err(Error::UnsafePath("c".into())), false)
            .unwrap_err();
        assert!(matches!(err, Error::ExtractingFile { ref path, .. } if path == "c"));
    }
}
