//! Dynamically typed management values
//!
//! `Value` is the tagged union every attribute, parameter and result travels
//! as inside the kernel. Its structured-text form is JSON: scalars map to JSON
//! scalars, lists to arrays, objects to objects, and the kinds JSON cannot
//! express directly are wrapped in a single-key tag object:
//!
//! ```text
//! {"EXPRESSION_VALUE": "${port:8080}"}
//! {"BYTES_VALUE": "AAEC"}                 (base64)
//! {"BIG_DECIMAL_VALUE": "3.14159265358979323846"}
//! {"BIG_INTEGER_VALUE": "18446744073709551616"}
//! {"PROPERTY_VALUE": {"name": "n", "value": 1}}
//! ```
//!
//! A real object whose only key is one of these tags (or `OBJECT_VALUE`) is
//! wrapped as `{"OBJECT_VALUE": {...}}` so it reads back as an object.

use crate::errors::{BridgeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;

const EXPRESSION_TAG: &str = "EXPRESSION_VALUE";
const BYTES_TAG: &str = "BYTES_VALUE";
const BIG_DECIMAL_TAG: &str = "BIG_DECIMAL_VALUE";
const BIG_INTEGER_TAG: &str = "BIG_INTEGER_VALUE";
const PROPERTY_TAG: &str = "PROPERTY_VALUE";
const OBJECT_TAG: &str = "OBJECT_VALUE";

const RESERVED_TAGS: &[&str] = &[
    EXPRESSION_TAG,
    BYTES_TAG,
    BIG_DECIMAL_TAG,
    BIG_INTEGER_TAG,
    PROPERTY_TAG,
    OBJECT_TAG,
];

/// Kind tag shared by values and type descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueKind {
    #[default]
    Undefined,
    Boolean,
    Int64,
    Float64,
    BigDecimal,
    BigInteger,
    Bytes,
    String,
    Expression,
    List,
    Object,
    Property,
}

impl ValueKind {
    /// Kinds with a single scalar external representation
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            ValueKind::Boolean
                | ValueKind::Int64
                | ValueKind::Float64
                | ValueKind::BigDecimal
                | ValueKind::BigInteger
                | ValueKind::String
                | ValueKind::Expression
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Undefined => "UNDEFINED",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::Int64 => "INT64",
            ValueKind::Float64 => "FLOAT64",
            ValueKind::BigDecimal => "BIG_DECIMAL",
            ValueKind::BigInteger => "BIG_INTEGER",
            ValueKind::Bytes => "BYTES",
            ValueKind::String => "STRING",
            ValueKind::Expression => "EXPRESSION",
            ValueKind::List => "LIST",
            ValueKind::Object => "OBJECT",
            ValueKind::Property => "PROPERTY",
        };
        f.write_str(name)
    }
}

/// Internal dynamically typed value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    /// Arbitrary precision decimal kept in its textual form
    BigDecimal(String),
    /// Arbitrary precision integer kept in its textual form
    BigInteger(String),
    Bytes(Vec<u8>),
    String(String),
    /// Unresolved placeholder-bearing string, distinct from a literal string
    Expression(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
    Property(String, Box<Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float64(_) => ValueKind::Float64,
            Value::BigDecimal(_) => ValueKind::BigDecimal,
            Value::BigInteger(_) => ValueKind::BigInteger,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::String(_) => ValueKind::String,
            Value::Expression(_) => ValueKind::Expression,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
            Value::Property(_, _) => ValueKind::Property,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Value::Undefined)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn expression(s: impl Into<String>) -> Self {
        Value::Expression(s.into())
    }

    pub fn property(name: impl Into<String>, value: Value) -> Self {
        Value::Property(name.into(), Box::new(value))
    }

    /// Build an OBJECT from `(key, value)` pairs, keeping their order
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Field of an OBJECT value
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Expression(s) => Some(s),
            _ => None,
        }
    }

    /// Plain text of a scalar value; complex values use their structured text
    pub fn as_text(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Float64(d) => d.to_string(),
            Value::BigDecimal(s) | Value::BigInteger(s) | Value::String(s) | Value::Expression(s) => {
                s.clone()
            }
            _ => self.to_json_string(),
        }
    }

    // ===== STRUCTURED TEXT =====

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Undefined => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Int64(i) => JsonValue::from(*i),
            Value::Float64(d) => JsonValue::from(*d),
            Value::BigDecimal(s) => tagged(BIG_DECIMAL_TAG, JsonValue::String(s.clone())),
            Value::BigInteger(s) => tagged(BIG_INTEGER_TAG, JsonValue::String(s.clone())),
            Value::Bytes(b) => tagged(BYTES_TAG, JsonValue::String(BASE64.encode(b))),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Expression(s) => tagged(EXPRESSION_TAG, JsonValue::String(s.clone())),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => {
                let plain = JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect());
                match map.keys().next() {
                    Some(key) if map.len() == 1 && RESERVED_TAGS.contains(&key.as_str()) => {
                        tagged(OBJECT_TAG, plain)
                    }
                    _ => plain,
                }
            }
            Value::Property(name, value) => {
                let mut inner = JsonMap::new();
                inner.insert("name".to_string(), JsonValue::String(name.clone()));
                inner.insert("value".to_string(), value.to_json());
                tagged(PROPERTY_TAG, JsonValue::Object(inner))
            }
        }
    }

    pub fn from_json(json: &JsonValue) -> Result<Self> {
        Ok(match json {
            JsonValue::Null => Value::Undefined,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInteger(u.to_string())
                } else {
                    Value::Float64(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect::<Result<Vec<_>>>()?)
            }
            JsonValue::Object(map) => {
                if let Some(value) = untag(map)? {
                    return Ok(value);
                }
                object_from_json(map)?
            }
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: JsonValue = serde_json::from_str(text)?;
        Value::from_json(&json)
    }
}

fn tagged(tag: &str, inner: JsonValue) -> JsonValue {
    let mut map = JsonMap::new();
    map.insert(tag.to_string(), inner);
    JsonValue::Object(map)
}

fn object_from_json(map: &JsonMap<String, JsonValue>) -> Result<Value> {
    let mut entries = IndexMap::with_capacity(map.len());
    for (k, v) in map {
        entries.insert(k.clone(), Value::from_json(v)?);
    }
    Ok(Value::Object(entries))
}

fn untag(map: &JsonMap<String, JsonValue>) -> Result<Option<Value>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((tag, inner)) = map.iter().next() else {
        return Ok(None);
    };
    let text = inner.as_str();
    let value = match (tag.as_str(), text) {
        (EXPRESSION_TAG, Some(s)) => Value::Expression(s.to_string()),
        (BIG_DECIMAL_TAG, Some(s)) => Value::BigDecimal(s.to_string()),
        (BIG_INTEGER_TAG, Some(s)) => Value::BigInteger(s.to_string()),
        (BYTES_TAG, Some(s)) => Value::Bytes(
            BASE64
                .decode(s)
                .map_err(|e| BridgeError::TypeConversion(format!("Invalid base64 bytes: {}", e)))?,
        ),
        (OBJECT_TAG, None) => match inner.as_object() {
            Some(fields) => object_from_json(fields)?,
            None => return Ok(None),
        },
        (PROPERTY_TAG, None) => {
            let name = inner
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| BridgeError::TypeConversion("Property without a name".to_string()))?;
            let value = inner.get("value").map(Value::from_json).transpose()?.unwrap_or_default();
            Value::property(name, value)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Value::from_json(&json).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Float64(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
