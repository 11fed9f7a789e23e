//! RPA archive reader for Ren'Py game files.
//!
//! RPA archives are a family of container formats sharing one layout: payload
//! bytes followed by a zlib-compressed pickle index mapping paths to
//! `(offset, length[, prefix])` records. The variants differ in how the index
//! is located and obfuscated:
//!
//! - RPA-1.0 keeps the index in a separate `.rpi` file
//! - RPA-2.0 stores the index offset in a text header
//! - RPA-3.0, RPA-3.2 and RPA-4.0 XOR index entries with a header key
//! - ALT-1.0 masks the key with a constant
//! - RPA-9.1 masks the offset and XOR-ciphers every payload byte
//!
//! # Example
//!
//! ```no_run
//! use unrpa_rpa::{ExtractOptions, RpaArchive};
//!
//! let archive = RpaArchive::open("game/archive.rpa")?;
//!
//! for path in archive.list() {
//!     println!("{path}");
//! }
//!
//! let report = archive.extract_all("out", &ExtractOptions::new())?;
//! println!("{} files extracted", report.extracted);
//! # Ok::<(), unrpa_rpa::Error>(())
//! ```

mod archive;
mod crypto;
mod decompress;
mod error;
mod extract;
mod index;
mod pickle;
mod view;
pub mod version;

pub use archive::{list_all, resolve_index, RpaArchive};
pub use crypto::{xor_stream, XorCipher};
pub use error::{Error, Result};
pub use extract::{extract_all, extract_index, ExtractFailure, ExtractOptions, ExtractReport};
pub use index::{Index, IndexEntry, IndexPart};
pub use version::{detect_version, OffsetAndKey, Version, VersionRegistry};
pub use view::ArchiveView;
