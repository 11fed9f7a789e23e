//! Shape-agnostic decoding of the pickled index.
//!
//! The index pickle is deserialized into [`RawValue`] trees without imposing
//! the expected layout, so that shape problems can be reported later together
//! with the path of the offending entry.
//!
//! Python 3 pickles `b""` under protocol 2 as a call to `bytes()`. Such
//! unresolved globals decode as `None`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_pickle::{DeOptions, HashableValue, Value};
use tracing::debug;

use crate::{Error, Result};

/// A pickled value reduced to what the index format can contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawValue {
    /// Any integer.
    Int(i128),
    /// Byte string or text string (as UTF-8).
    Bytes(Vec<u8>),
    /// Tuple, list or set.
    Seq(Vec<RawValue>),
    /// Anything else, named by its kind.
    Other(&'static str),
}

impl RawValue {
    /// Human readable kind, for error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RawValue::Int(_) => "int",
            RawValue::Bytes(_) => "bytes",
            RawValue::Seq(_) => "sequence",
            RawValue::Other(kind) => kind,
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pickled value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other("bool"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Int(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Int(v.into()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Int(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<RawValue, E> {
        Ok(i128::try_from(v).map_or(RawValue::Other("oversized int"), RawValue::Int))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other("float"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Bytes(v.as_bytes().to_vec()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Bytes(v.into_bytes()))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Bytes(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other("None"))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other("None"))
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<RawValue, D::Error> {
        RawValue::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<RawValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(16));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawValue::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawValue, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(RawValue::Other("dict"))
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::None => RawValue::Other("None"),
            Value::Bool(_) => RawValue::Other("bool"),
            Value::I64(v) => RawValue::Int(v.into()),
            Value::Int(v) => i128::try_from(&v).map_or(RawValue::Other("oversized int"), RawValue::Int),
            Value::F64(_) => RawValue::Other("float"),
            Value::Bytes(v) => RawValue::Bytes(v),
            Value::String(v) => RawValue::Bytes(v.into_bytes()),
            Value::List(items) | Value::Tuple(items) => {
                RawValue::Seq(items.into_iter().map(RawValue::from).collect())
            }
            Value::Set(items) | Value::FrozenSet(items) => RawValue::Seq(
                items
                    .into_iter()
                    .map(|item| RawValue::from(item.into_value()))
                    .collect(),
            ),
            Value::Dict(_) => RawValue::Other("dict"),
        }
    }
}

/// The top-level index mapping, in pickled order.
#[derive(Debug, Default)]
pub(crate) struct RawIndex {
    pub(crate) entries: Vec<(RawValue, RawValue)>,
}

impl<'de> Deserialize<'de> for RawIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RawIndexVisitor)
    }
}

struct RawIndexVisitor;

impl<'de> Visitor<'de> for RawIndexVisitor {
    type Value = RawIndex;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a dict mapping archive paths to entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawIndex, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(RawIndex { entries })
    }
}

impl RawIndex {
    fn from_dict(dict: BTreeMap<HashableValue, Value>) -> Self {
        Self {
            entries: dict
                .into_iter()
                .map(|(path, entry)| (RawValue::from(path.into_value()), RawValue::from(entry)))
                .collect(),
        }
    }
}

fn decode_options() -> DeOptions {
    DeOptions::new().replace_unresolved_globals()
}

/// Unpickle an inflated index blob.
///
/// Integers wider than 64 bits cannot pass through the ordered decode. Such
/// indexes are decoded through [`Value`] instead, whose dict iterates in key
/// order rather than pickled order.
pub(crate) fn unpickle_index(data: &[u8]) -> Result<RawIndex> {
    let ordered = match serde_pickle::from_slice(data, decode_options()) {
        Ok(index) => return Ok(index),
        Err(e) => e,
    };

    match serde_pickle::value_from_slice(data, decode_options()) {
        Ok(Value::Dict(dict)) => {
            debug!(error = %ordered, "index decoded in key order");
            Ok(RawIndex::from_dict(dict))
        }
        _ => Err(Error::index(format!("pickle: {ordered}"))),
    }
}
