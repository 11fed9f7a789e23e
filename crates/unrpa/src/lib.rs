//! Unrpa - Ren'Py RPA archive listing and extraction library.
//!
//! This crate bundles the unrpa library crates behind one dependency.
//!
//! # Crates
//!
//! - [`unrpa_common`] - Header line reading and preamble field parsing
//! - [`unrpa_rpa`] - RPA versions, index resolution and extraction
//!
//! # Example
//!
//! ```no_run
//! use unrpa::prelude::*;
//!
//! let registry = VersionRegistry::builtin();
//! let archive = RpaArchive::open_in("game/scripts.rpa", &registry)?;
//! println!("{} ({} files)", archive.version().name(), archive.entry_count());
//!
//! let options = ExtractOptions::new().continue_on_error(true);
//! let report = archive.extract_all("out", &options)?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.path, failure.error);
//! }
//! # Ok::<(), unrpa::rpa::Error>(())
//! ```

pub use unrpa_common as common;
pub use unrpa_rpa as rpa;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use unrpa_common::parse_hex;
    pub use unrpa_rpa::{
        detect_version, extract_all, list_all, ExtractOptions, ExtractReport, Index, IndexEntry,
        IndexPart, OffsetAndKey, RpaArchive, Version, VersionRegistry,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
