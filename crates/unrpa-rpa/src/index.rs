//! The resolved archive index.
//!
//! Pickled entries come in two shapes: `(offset, length)` from early
//! archives and `(offset, length, prefix)` from later ones. Everything is
//! normalized to [`IndexPart`] with an explicit (possibly empty) prefix, then
//! deobfuscated with the archive key when one is present.

use std::path::MAIN_SEPARATOR;

use rustc_hash::FxHashMap;

use crate::pickle::{RawIndex, RawValue};
use crate::{Error, Result};

/// Where one stored file (or segment of it) lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexPart {
    /// Offset of the payload in the archive.
    pub offset: u64,
    /// Logical length, including the prefix.
    pub length: u64,
    /// Leading bytes stored inline in the index.
    pub prefix: Vec<u8>,
}

impl IndexPart {
    /// Create a part.
    pub fn new(offset: u64, length: u64, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            length,
            prefix: prefix.into(),
        }
    }

    /// XOR offset and length with `key`. The prefix is never obfuscated.
    ///
    /// Applying the same key twice restores the original part.
    #[must_use]
    pub fn xor_key(&self, key: u64) -> Self {
        Self {
            offset: self.offset ^ key,
            length: self.length ^ key,
            prefix: self.prefix.clone(),
        }
    }

    /// Normalize a pickled part of two or three fields.
    pub(crate) fn from_raw(path: &str, raw: RawValue) -> Result<Self> {
        let fields = match raw {
            RawValue::Seq(fields) => fields,
            other => {
                return Err(Error::entry(
                    path,
                    format!("expected a tuple part, found {}", other.kind()),
                ))
            }
        };

        let mut fields = fields.into_iter();
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(offset), Some(length), prefix, None) => {
                // Protocol 2 writes an empty prefix as `bytes()`, which decodes as None.
                let prefix = match prefix {
                    None | Some(RawValue::Other("None")) => Vec::new(),
                    Some(RawValue::Bytes(bytes)) => bytes,
                    Some(other) => {
                        return Err(Error::entry(
                            path,
                            format!("expected a byte string prefix, found {}", other.kind()),
                        ))
                    }
                };

                Ok(Self {
                    offset: raw_u64(path, "offset", offset)?,
                    length: raw_u64(path, "length", length)?,
                    prefix,
                })
            }
            _ => Err(Error::entry(path, "part must have 2 or 3 fields")),
        }
    }
}

fn raw_u64(path: &str, field: &str, raw: RawValue) -> Result<u64> {
    match raw {
        RawValue::Int(value) => u64::try_from(value)
            .map_err(|_| Error::entry(path, format!("{field} {value} is out of range"))),
        other => Err(Error::entry(
            path,
            format!("expected an integer {field}, found {}", other.kind()),
        )),
    }
}

/// An index entry: one or more parts, of which only the first is extracted.
///
/// Additional parts are kept as found in the index but carry no meaning for
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexEntry {
    parts: Vec<IndexPart>,
}

impl IndexEntry {
    /// Create an entry from its parts.
    pub fn new(parts: Vec<IndexPart>) -> Self {
        Self { parts }
    }

    /// The part used for extraction.
    #[inline]
    pub fn first(&self) -> Option<&IndexPart> {
        self.parts.first()
    }

    /// All parts, in index order.
    #[inline]
    pub fn parts(&self) -> &[IndexPart] {
        &self.parts
    }

    /// XOR every part with `key`.
    #[must_use]
    pub fn xor_key(&self, key: u64) -> Self {
        Self {
            parts: self.parts.iter().map(|part| part.xor_key(key)).collect(),
        }
    }

    pub(crate) fn from_raw(path: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Seq(parts) => Ok(Self {
                parts: parts
                    .into_iter()
                    .map(|part| IndexPart::from_raw(path, part))
                    .collect::<Result<_>>()?,
            }),
            other => Err(Error::entry(
                path,
                format!("expected a list of parts, found {}", other.kind()),
            )),
        }
    }
}

/// Archive path to entry mapping.
///
/// Paths use the host separator. Iteration follows the order of the pickled
/// index; [`Index::sorted_paths`] gives the listing order.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<(String, IndexEntry)>,
    positions: FxHashMap<String, usize>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. A repeated path keeps its first position and takes
    /// the new entry.
    pub fn insert(&mut self, path: impl Into<String>, entry: IndexEntry) {
        let path = path.into();
        match self.positions.get(&path) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.positions.insert(path.clone(), self.entries.len());
                self.entries.push((path, entry));
            }
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by path (host separators).
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.positions.get(path).map(|&pos| &self.entries[pos].1)
    }

    /// Iterate over entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> + '_ {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// All paths, sorted lexicographically.
    pub fn sorted_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.iter().map(|(path, _)| path.clone()).collect();
        paths.sort();
        paths
    }

    /// Build the index from the unpickled mapping, deobfuscating with `key`.
    pub(crate) fn from_raw(raw: RawIndex, key: Option<u64>) -> Result<Self> {
        let mut index = Self::new();

        for (raw_path, raw_entry) in raw.entries {
            let path = match raw_path {
                RawValue::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                other => {
                    return Err(Error::index(format!(
                        "expected a string path key, found {}",
                        other.kind()
                    )))
                }
            };

            let entry = IndexEntry::from_raw(&path, raw_entry)?;
            let entry = match key {
                Some(key) => entry.xor_key(key),
                None => entry,
            };

            index.insert(host_path(&path), entry);
        }

        Ok(index)
    }
}

/// Rewrite archive separators (`/`) to the host separator.
fn host_path(path: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace('/', std::path::MAIN_SEPARATOR_STR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_part(fields: Vec<RawValue>) -> RawValue {
        RawValue::Seq(fields)
    }

    #[test]
    fn test_two_field_part_gets_empty_prefix() {
        let part = IndexPart::from_raw(
            "a.txt",
            raw_part(vec![RawValue::Int(10), RawValue::Int(20)]),
        )
        .unwrap();

        assert_eq!(part, IndexPart::new(10, 20, Vec::new()));
    }

    #[test]
    fn test_three_field_part_is_kept() {
        let part = IndexPart::from_raw(
            "a.txt",
            raw_part(vec![
                RawValue::Int(10),
                RawValue::Int(20),
                RawValue::Bytes(b"xy".to_vec()),
            ]),
        )
        .unwrap();

        assert_eq!(part, IndexPart::new(10, 20, b"xy".to_vec()));
    }

    #[test]
    fn test_none_prefix_is_empty() {
        let part = IndexPart::from_raw(
            "a.txt",
            raw_part(vec![RawValue::Int(1), RawValue::Int(2), RawValue::Other("None")]),
        )
        .unwrap();

        assert_eq!(part, IndexPart::new(1, 2, Vec::new()));
    }

    #[test]
    fn test_full_width_offsets() {
        let key = 0x4242_4242_u64;
        let part = IndexPart::from_raw(
            "wide.bin",
            raw_part(vec![
                RawValue::Int(i128::from(0xDEAD_BEEF_CAFE_1234_u64 ^ key)),
                RawValue::Int(i128::from(2 ^ key)),
            ]),
        )
        .unwrap()
        .xor_key(key);

        assert_eq!(part, IndexPart::new(0xDEAD_BEEF_CAFE_1234, 2, Vec::new()));

        let too_wide = IndexPart::from_raw(
            "wide.bin",
            raw_part(vec![RawValue::Other("oversized int"), RawValue::Int(2)]),
        );
        assert!(matches!(
            too_wide,
            Err(Error::IndexDecode { path: Some(ref p), .. }) if p == "wide.bin"
        ));
    }

    #[test]
    fn test_malformed_parts_name_the_path() {
        let cases = vec![
            raw_part(vec![RawValue::Int(1)]),
            raw_part(vec![
                RawValue::Int(1),
                RawValue::Int(2),
                RawValue::Bytes(Vec::new()),
                RawValue::Int(4),
            ]),
            raw_part(vec![RawValue::Bytes(b"1".to_vec()), RawValue::Int(2)]),
            raw_part(vec![RawValue::Int(1), RawValue::Int(2), RawValue::Int(3)]),
            raw_part(vec![RawValue::Int(-1), RawValue::Int(2)]),
            RawValue::Int(7),
        ];

        for raw in cases {
            match IndexPart::from_raw("dir/bad.png", raw) {
                Err(Error::IndexDecode { path, .. }) => {
                    assert_eq!(path.as_deref(), Some("dir/bad.png"))
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_xor_key_is_self_inverse() {
        let key = 0xDEAD_BEEF;
        for part in [
            IndexPart::new(0, 0, Vec::new()),
            IndexPart::new(1234, 5678, b"pre".to_vec()),
            IndexPart::new(u64::MAX, 42, Vec::new()),
        ] {
            let hidden = part.xor_key(key);
            assert_eq!(hidden.prefix, part.prefix);
            assert_eq!(hidden.xor_key(key), part);
        }
    }

    #[test]
    fn test_from_raw_deobfuscates_and_rewrites_paths() {
        let key = 0x4242_4242;
        let raw = RawIndex {
            entries: vec![(
                RawValue::Bytes(b"images/bg.png".to_vec()),
                RawValue::Seq(vec![
                    raw_part(vec![
                        RawValue::Int((100 ^ key) as i128),
                        RawValue::Int((10 ^ key) as i128),
                    ]),
                    raw_part(vec![RawValue::Int(1), RawValue::Int(2)]),
                ]),
            )],
        };

        let index = Index::from_raw(raw, Some(key)).unwrap();
        let path = format!("images{MAIN_SEPARATOR}bg.png");
        let entry = index.get(&path).unwrap();

        assert_eq!(entry.first(), Some(&IndexPart::new(100, 10, Vec::new())));
        assert_eq!(entry.parts().len(), 2);
    }

    #[test]
    fn test_from_raw_without_key() {
        let raw = RawIndex {
            entries: vec![(
                RawValue::Bytes(b"a.txt".to_vec()),
                RawValue::Seq(vec![raw_part(vec![RawValue::Int(5), RawValue::Int(6)])]),
            )],
        };

        let index = Index::from_raw(raw, None).unwrap();
        assert_eq!(
            index.get("a.txt").and_then(IndexEntry::first),
            Some(&IndexPart::new(5, 6, Vec::new()))
        );
    }

    #[test]
    fn test_invalid_utf8_paths_are_replaced() {
        let raw = RawIndex {
            entries: vec![(
                RawValue::Bytes(vec![b'a', 0xFF, b'.', b't']),
                RawValue::Seq(Vec::new()),
            )],
        };

        let index = Index::from_raw(raw, None).unwrap();
        assert_eq!(index.sorted_paths(), vec!["a\u{FFFD}.t".to_string()]);
    }

    #[test]
    fn test_insertion_order_and_sorting() {
        let mut index = Index::new();
        index.insert("c.txt", IndexEntry::default());
        index.insert("a.txt", IndexEntry::default());
        index.insert("b.txt", IndexEntry::default());
        index.insert("c.txt", IndexEntry::new(vec![IndexPart::new(1, 1, Vec::new())]));

        let order: Vec<&str> = index.iter().map(|(path, _)| path).collect();
        assert_eq!(order, vec!["c.txt", "a.txt", "b.txt"]);
        assert_eq!(index.sorted_paths(), vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(index.get("c.txt").unwrap().parts().len(), 1);
    }
}
