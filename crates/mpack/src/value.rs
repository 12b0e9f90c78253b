//! [`Value`] — the decoded/encodable MessagePack value model.

use std::sync::Arc;

use crate::Timestamp;

/// An application extension value: a signed 8-bit type id plus an opaque
/// payload.
///
/// Ids `0..=127` are application-defined; `-128..=-1` are reserved for the
/// format (`-1` is the standard timestamp, which decodes as
/// [`Value::Timestamp`] rather than a raw `Ext`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ext {
    pub type_id: i8,
    pub data: Vec<u8>,
}

impl Ext {
    pub fn new(type_id: i8, data: Vec<u8>) -> Self {
        Self { type_id, data }
    }
}

/// Every value MessagePack can represent.
///
/// Maps are ordered pair lists: wire order is preserved on decode and
/// iteration order is preserved on encode. Duplicate keys are permitted at
/// the wire level.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    /// Signed integer. All wire integers that fit in `i64` normalize here.
    Int(i64),
    /// Unsigned integer above `i64::MAX`, produced only by `uint64` payloads.
    UInt(u64),
    /// Floating point. `float32` payloads widen to `f64` on decode; the
    /// original width is a wire-level property only.
    Float(f64),
    Str(String),
    /// Interned identifier, produced for map keys under `symbolize_keys`.
    Symbol(Arc<str>),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ext(Ext),
    /// The standard `-1` timestamp extension, decoded to a first-class value.
    Timestamp(Timestamp),
    /// Arbitrary-precision integer. Values outside the native `i64`/`u64`
    /// wire range can only be encoded through a registered
    /// oversized-integer extension.
    BigInt(i128),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::BigInt(b) => i64::try_from(*b).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            Value::BigInt(b) => u64::try_from(*b).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up the first entry of a map whose key is the given string.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::UInt(u),
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bin(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::json!(i),
            Value::UInt(u) => serde_json::json!(u),
            Value::Float(f) => serde_json::json!(f),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Symbol(s) => serde_json::Value::String(s.to_string()),
            Value::Bin(b) => serde_json::Value::Array(
                b.into_iter().map(|x| serde_json::json!(x)).collect(),
            ),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::Str(s) => s,
                            Value::Symbol(s) => s.to_string(),
                            other => serde_json::Value::from(other).to_string(),
                        };
                        (key, serde_json::Value::from(v))
                    })
                    .collect(),
            ),
            Value::Ext(ext) => serde_json::json!({
                "type": ext.type_id,
                "data": ext.data,
            }),
            Value::Timestamp(ts) => serde_json::json!({
                "sec": ts.sec,
                "nsec": ts.nsec,
            }),
            Value::BigInt(i) => serde_json::json!(i.to_string()),
        }
    }
}
