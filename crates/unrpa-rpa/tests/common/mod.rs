//! Archive fixtures built on the fly.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_pickle::{HashableValue, SerOptions, Value};

/// Length of an `RPA-3.0 <offset:16> <key:8>\n` header.
pub const RPA3_HEADER_LEN: usize = 34;

/// Pickled index under construction, keyed by archive path.
pub type RawIndex = BTreeMap<HashableValue, Value>;

/// A pickled part tuple. Offsets and lengths are stored as given.
pub fn part(offset: u64, length: u64, prefix: Option<&[u8]>) -> Value {
    let mut fields = vec![Value::I64(offset as i64), Value::I64(length as i64)];
    if let Some(prefix) = prefix {
        fields.push(Value::Bytes(prefix.to_vec()));
    }
    Value::Tuple(fields)
}

/// Add an entry with the given parts.
pub fn insert(index: &mut RawIndex, path: &str, parts: Vec<Value>) {
    index.insert(HashableValue::Bytes(path.as_bytes().to_vec()), Value::List(parts));
}

/// zlib(pickle(index)).
pub fn compressed_index(index: RawIndex) -> Vec<u8> {
    let pickled = serde_pickle::value_to_vec(&Value::Dict(index), SerOptions::new()).unwrap();
    zlib(&pickled)
}

/// zlib-compress `data`, for pickles captured from Python.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Append the index to `body` and write an RPA-3.0 header over its first
/// [`RPA3_HEADER_LEN`] bytes.
pub fn finish_rpa3(mut body: Vec<u8>, index: RawIndex, key: u64) -> Vec<u8> {
    assert!(body.len() >= RPA3_HEADER_LEN);
    let offset = body.len() as u64;
    body.extend(compressed_index(index));

    let header = format!("RPA-3.0 {offset:016x} {key:08x}\n");
    body[..header.len()].copy_from_slice(header.as_bytes());
    body
}

/// An RPA-3.0 archive storing `files` contiguously, entries keyed with `key`.
pub fn rpa3_archive(files: &[(&str, &[u8])], key: u64) -> Vec<u8> {
    let mut body = vec![0u8; RPA3_HEADER_LEN];
    let mut index = RawIndex::new();

    for (path, data) in files {
        let offset = body.len() as u64;
        body.extend_from_slice(data);
        insert(
            &mut index,
            path,
            vec![part(offset ^ key, data.len() as u64 ^ key, Some(b""))],
        );
    }

    finish_rpa3(body, index, key)
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// An archive path using the host separator.
pub fn host(path: &str) -> String {
    path.replace('/', std::path::MAIN_SEPARATOR_STR)
}
