//! Common utilities for unrpa.
//!
//! This crate provides the small building blocks shared by the archive crates:
//!
//! - [`read_header_line`] - Bounded read of an archive's first line
//! - [`Preamble`] - Field access over the ASCII preamble of tagged archives
//! - [`parse_hex`] - Hex integer parsing as the archive writers emit it

mod error;
mod preamble;

pub use error::{Error, Result};
pub use preamble::{parse_hex, read_header_line, Preamble, MAX_HEADER_LINE};
