//! Core data types for evaluation.
//!
//! [`FieldValue`] is the dynamic value union flowing through the engine:
//! deserialized message payloads, intermediate expression results and
//! projected output all use it. [`Tuple`] and [`JoinTuple`] are the event
//! containers handed in by the runtime.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::eventsql::sql::error::{SqlError, SqlResult};

/// A dynamic value in an event record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
    /// SQL NULL
    Null,
    /// Array of values
    Array(Vec<FieldValue>),
    /// String-keyed map
    Map(HashMap<String, FieldValue>),
    /// Raw byte buffer passing through from a binary payload
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short type tag used in runtime error details.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Boolean(_) => "bool",
            FieldValue::Null => "nil",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::Bytes(_) => "bytes",
        }
    }

    /// Numeric view, promoting integers to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Parse a JSON document into a value tree.
    pub fn from_json_str(s: &str) -> SqlResult<FieldValue> {
        serde_json::from_str(s)
            .map_err(|e| SqlError::execution_error(format!("invalid JSON value: {}", e)))
    }
}

/// Value-level typed equality: no implicit cross-type equality except the
/// int/float numeric promotion.
pub fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Integer(x), FieldValue::Float(y))
        | (FieldValue::Float(y), FieldValue::Integer(x)) => (*x as f64) == *y,
        _ => a == b,
    }
}

/// Ordering for comparison operators, MIN/MAX and sorting. Numeric values
/// order numerically with promotion; strings order lexicographically over
/// code units; anything else is a type error.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> SqlResult<Ordering> {
    match (a, b) {
        (FieldValue::Integer(x), FieldValue::Integer(y)) => Ok(x.cmp(y)),
        (FieldValue::String(x), FieldValue::String(y)) => Ok(x.cmp(y)),
        (FieldValue::Boolean(x), FieldValue::Boolean(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(SqlError::type_error(
                        format!("comparable value pair, got {}", a.type_name()),
                        b.type_name(),
                    ));
                }
            };
            x.partial_cmp(&y)
                .ok_or_else(|| SqlError::execution_error("NaN is not comparable"))
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(map) => {
                // deterministic order for logs and grouping keys
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[*k])?;
                }
                write!(f, "}}")
            }
            FieldValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Direct JSON serialization without an intermediate `serde_json::Value`.
impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for elem in arr {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            FieldValue::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            FieldValue::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON value (string, number, bool, null, array, or object)")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Boolean(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v <= i64::MAX as u64 {
            Ok(FieldValue::Integer(v as i64))
        } else {
            Ok(FieldValue::Float(v as f64))
        }
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::String(v))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Null)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::new();
        while let Some(v) = seq.next_element()? {
            values.push(v);
        }
        Ok(FieldValue::Array(values))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut values = HashMap::new();
        while let Some((k, v)) = map.next_entry::<String, FieldValue>()? {
            values.insert(k, v);
        }
        Ok(FieldValue::Map(values))
    }
}

/// A single event: emitter name, message payload and transport metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple {
    pub emitter: String,
    pub message: HashMap<String, FieldValue>,
    pub metadata: HashMap<String, FieldValue>,
}

impl Tuple {
    pub fn new(emitter: impl Into<String>) -> Self {
        Tuple {
            emitter: emitter.into(),
            message: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_message(mut self, message: HashMap<String, FieldValue>) -> Self {
        self.message = message;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, FieldValue>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Message column lookup; a missing column reads as Null.
    pub fn value(&self, name: &str) -> FieldValue {
        self.message.get(name).cloned().unwrap_or(FieldValue::Null)
    }

    /// Metadata lookup; a missing entry reads as Null.
    pub fn meta_value(&self, name: &str) -> FieldValue {
        self.metadata.get(name).cloned().unwrap_or(FieldValue::Null)
    }
}

/// One tuple from each side of a join, in join declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinTuple {
    pub tuples: Vec<Tuple>,
}

impl JoinTuple {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        JoinTuple { tuples }
    }
}

/// Tuples sharing a grouping key, in runtime insertion order.
pub type GroupedTuples = [Tuple];
