//! External closed type system
//!
//! The external protocol knows a fixed set of simple types, byte arrays,
//! homogeneous arrays, composite records and tables of composite rows.
//! Every internal value crosses the bridge as an [`OpenValue`] described by an
//! [`OpenType`].

use crate::errors::{BridgeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    Boolean,
    Long,
    Double,
    BigDecimal,
    BigInteger,
    String,
}

impl SimpleType {
    pub fn type_name(&self) -> &'static str {
        match self {
            SimpleType::Boolean => "boolean",
            SimpleType::Long => "long",
            SimpleType::Double => "double",
            SimpleType::BigDecimal => "bigdecimal",
            SimpleType::BigInteger => "biginteger",
            SimpleType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeItem {
    pub name: String,
    pub description: String,
    pub open_type: OpenType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub type_name: String,
    pub description: String,
    pub items: Vec<CompositeItem>,
}

impl CompositeType {
    pub fn new(type_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            description: description.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, name: impl Into<String>, description: impl Into<String>, open_type: OpenType) -> Self {
        self.items.push(CompositeItem {
            name: name.into(),
            description: description.into(),
            open_type,
        });
        self
    }

    pub fn item(&self, name: &str) -> Option<&CompositeItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.item(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularType {
    pub type_name: String,
    pub description: String,
    pub row_type: CompositeType,
    pub index_names: Vec<String>,
}

/// Descriptor of an external value
#[derive(Debug, Clone, PartialEq)]
pub enum OpenType {
    Simple(SimpleType),
    Bytes,
    Array(Box<OpenType>),
    Composite(CompositeType),
    Tabular(TabularType),
}

impl OpenType {
    pub fn string() -> Self {
        OpenType::Simple(SimpleType::String)
    }

    pub fn array_of(element: OpenType) -> Self {
        OpenType::Array(Box::new(element))
    }

    /// Short type name used in descriptors and notifications
    pub fn type_name(&self) -> String {
        match self {
            OpenType::Simple(simple) => simple.type_name().to_string(),
            OpenType::Bytes => "bytes".to_string(),
            OpenType::Array(element) => format!("{}[]", element.type_name()),
            OpenType::Composite(composite) => composite.type_name.clone(),
            OpenType::Tabular(tabular) => tabular.type_name.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            OpenType::Simple(_) | OpenType::Bytes => JsonValue::String(self.type_name()),
            OpenType::Array(element) => json!({"array": element.to_json()}),
            OpenType::Composite(composite) => composite_type_json(composite),
            OpenType::Tabular(tabular) => json!({
                "tabular": tabular.type_name,
                "description": tabular.description,
                "row": composite_type_json(&tabular.row_type),
                "index": tabular.index_names,
            }),
        }
    }
}

fn composite_type_json(composite: &CompositeType) -> JsonValue {
    let items: JsonMap<String, JsonValue> = composite
        .items
        .iter()
        .map(|i| (i.name.clone(), json!({"description": i.description, "type": i.open_type.to_json()})))
        .collect();
    json!({"composite": composite.type_name, "description": composite.description, "items": items})
}

impl fmt::Display for OpenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Record conforming to a [`CompositeType`]; every item has a value, possibly `Null`
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeData {
    composite_type: CompositeType,
    values: IndexMap<String, OpenValue>,
}

impl CompositeData {
    /// # Errors
    /// `TypeConversion` when a value names no item or does not conform to its item type
    pub fn new(composite_type: CompositeType, mut values: IndexMap<String, OpenValue>) -> Result<Self> {
        for key in values.keys() {
            if !composite_type.contains(key) {
                return Err(BridgeError::TypeConversion(format!(
                    "Item {} is not part of composite type {}",
                    key, composite_type.type_name
                )));
            }
        }
        let mut ordered = IndexMap::with_capacity(composite_type.items.len());
        for item in &composite_type.items {
            let value = values.shift_remove(&item.name).unwrap_or(OpenValue::Null);
            if !value.conforms_to(&item.open_type) {
                return Err(BridgeError::TypeConversion(format!(
                    "Item {} expects {}, got {}",
                    item.name,
                    item.open_type,
                    value.kind_name()
                )));
            }
            ordered.insert(item.name.clone(), value);
        }
        Ok(Self {
            composite_type,
            values: ordered,
        })
    }

    pub fn composite_type(&self) -> &CompositeType {
        &self.composite_type
    }

    pub fn get(&self, key: &str) -> Option<&OpenValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OpenValue)> {
        self.values.iter()
    }
}

/// Rows of a [`TabularType`]
#[derive(Debug, Clone, PartialEq)]
pub struct TabularData {
    tabular_type: TabularType,
    rows: Vec<CompositeData>,
}

impl TabularData {
    pub fn new(tabular_type: TabularType) -> Self {
        Self {
            tabular_type,
            rows: Vec::new(),
        }
    }

    /// # Errors
    /// `TypeConversion` when the row has another type or repeats an index
    pub fn put(&mut self, row: CompositeData) -> Result<()> {
        if row.composite_type != self.tabular_type.row_type {
            return Err(BridgeError::TypeConversion(format!(
                "Row type {} does not match table {}",
                row.composite_type.type_name, self.tabular_type.type_name
            )));
        }
        let index = self.index_of(&row);
        if self.rows.iter().any(|r| self.index_of(r) == index) {
            return Err(BridgeError::TypeConversion(format!(
                "Duplicate row index in table {}",
                self.tabular_type.type_name
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn tabular_type(&self) -> &TabularType {
        &self.tabular_type
    }

    pub fn rows(&self) -> &[CompositeData] {
        &self.rows
    }

    fn index_of<'a>(&self, row: &'a CompositeData) -> Vec<Option<&'a OpenValue>> {
        self.tabular_type.index_names.iter().map(|n| row.get(n)).collect()
    }
}

/// Value of the external protocol
#[derive(Debug, Clone, PartialEq)]
pub enum OpenValue {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    BigDecimal(String),
    BigInteger(String),
    String(String),
    Bytes(Vec<u8>),
    Array { element_type: OpenType, values: Vec<OpenValue> },
    Composite(CompositeData),
    Tabular(TabularData),
}

impl OpenValue {
    pub fn string(s: impl Into<String>) -> Self {
        OpenValue::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OpenValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OpenValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OpenValue::Null => "null",
            OpenValue::Boolean(_) => "boolean",
            OpenValue::Long(_) => "long",
            OpenValue::Double(_) => "double",
            OpenValue::BigDecimal(_) => "bigdecimal",
            OpenValue::BigInteger(_) => "biginteger",
            OpenValue::String(_) => "string",
            OpenValue::Bytes(_) => "bytes",
            OpenValue::Array { .. } => "array",
            OpenValue::Composite(_) => "composite",
            OpenValue::Tabular(_) => "tabular",
        }
    }

    /// Whether this value is an instance of `open_type`; `Null` conforms to every type
    pub fn conforms_to(&self, open_type: &OpenType) -> bool {
        match (self, open_type) {
            (OpenValue::Null, _) => true,
            (OpenValue::Boolean(_), OpenType::Simple(SimpleType::Boolean))
            | (OpenValue::Long(_), OpenType::Simple(SimpleType::Long))
            | (OpenValue::Double(_), OpenType::Simple(SimpleType::Double))
            | (OpenValue::BigDecimal(_), OpenType::Simple(SimpleType::BigDecimal))
            | (OpenValue::BigInteger(_), OpenType::Simple(SimpleType::BigInteger))
            | (OpenValue::String(_), OpenType::Simple(SimpleType::String))
            | (OpenValue::Bytes(_), OpenType::Bytes) => true,
            (OpenValue::Array { element_type, .. }, OpenType::Array(expected)) => element_type == expected.as_ref(),
            (OpenValue::Composite(data), OpenType::Composite(expected)) => &data.composite_type == expected,
            (OpenValue::Tabular(data), OpenType::Tabular(expected)) => &data.tabular_type == expected,
            _ => false,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            OpenValue::Null => JsonValue::Null,
            OpenValue::Boolean(b) => JsonValue::Bool(*b),
            OpenValue::Long(l) => JsonValue::from(*l),
            OpenValue::Double(d) => JsonValue::from(*d),
            OpenValue::BigDecimal(s) | OpenValue::BigInteger(s) | OpenValue::String(s) => {
                JsonValue::String(s.clone())
            }
            OpenValue::Bytes(b) => JsonValue::String(BASE64.encode(b)),
            OpenValue::Array { values, .. } => JsonValue::Array(values.iter().map(OpenValue::to_json).collect()),
            OpenValue::Composite(data) => composite_json(data),
            OpenValue::Tabular(data) => JsonValue::Array(data.rows.iter().map(composite_json).collect()),
        }
    }

    /// Build a value of `open_type` from JSON text input
    ///
    /// Numbers may be given as JSON numbers or strings; byte arrays as base64.
    pub fn from_json(open_type: &OpenType, json: &JsonValue) -> Result<Self> {
        if json.is_null() {
            return Ok(OpenValue::Null);
        }
        let mismatch = || {
            BridgeError::TypeConversion(format!("Cannot read {} as {}", json, open_type))
        };
        Ok(match open_type {
            OpenType::Simple(SimpleType::Boolean) => match json {
                JsonValue::Bool(b) => OpenValue::Boolean(*b),
                JsonValue::String(s) => OpenValue::Boolean(s.parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            OpenType::Simple(SimpleType::Long) => match json {
                JsonValue::Number(n) => OpenValue::Long(n.as_i64().ok_or_else(mismatch)?),
                JsonValue::String(s) => OpenValue::Long(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            OpenType::Simple(SimpleType::Double) => match json {
                JsonValue::Number(n) => OpenValue::Double(n.as_f64().ok_or_else(mismatch)?),
                JsonValue::String(s) => OpenValue::Double(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            OpenType::Simple(SimpleType::BigDecimal) => OpenValue::BigDecimal(scalar_text(json).ok_or_else(mismatch)?),
            OpenType::Simple(SimpleType::BigInteger) => OpenValue::BigInteger(scalar_text(json).ok_or_else(mismatch)?),
            OpenType::Simple(SimpleType::String) => match json {
                JsonValue::String(s) => OpenValue::String(s.clone()),
                other => OpenValue::String(other.to_string()),
            },
            OpenType::Bytes => {
                let text = json.as_str().ok_or_else(mismatch)?;
                OpenValue::Bytes(BASE64.decode(text).map_err(|_| mismatch())?)
            }
            OpenType::Array(element) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                OpenValue::Array {
                    element_type: element.as_ref().clone(),
                    values: items
                        .iter()
                        .map(|i| OpenValue::from_json(element, i))
                        .collect::<Result<Vec<_>>>()?,
                }
            }
            OpenType::Composite(composite) => {
                OpenValue::Composite(composite_from_json(composite, json).ok_or_else(mismatch)??)
            }
            OpenType::Tabular(tabular) => {
                let mut data = TabularData::new(tabular.clone());
                match json {
                    JsonValue::Array(rows) => {
                        for row in rows {
                            data.put(composite_from_json(&tabular.row_type, row).ok_or_else(mismatch)??)?;
                        }
                    }
                    // `{"k": v}` shorthand for key/value tables
                    JsonValue::Object(map) if tabular.index_names == ["key"] => {
                        for (key, value) in map {
                            let row = json!({"key": key, "value": value});
                            data.put(composite_from_json(&tabular.row_type, &row).ok_or_else(mismatch)??)?;
                        }
                    }
                    _ => return Err(mismatch()),
                }
                OpenValue::Tabular(data)
            }
        })
    }
}

fn scalar_text(json: &JsonValue) -> Option<String> {
    match json {
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn composite_json(data: &CompositeData) -> JsonValue {
    JsonValue::Object(data.values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

fn composite_from_json(composite: &CompositeType, json: &JsonValue) -> Option<Result<CompositeData>> {
    let map = json.as_object()?;
    let mut values = IndexMap::new();
    for (key, value) in map {
        let Some(item) = composite.item(key) else {
            return Some(Err(BridgeError::TypeConversion(format!(
                "Item {} is not part of composite type {}",
                key, composite.type_name
            ))));
        };
        match OpenValue::from_json(&item.open_type, value) {
            Ok(v) => {
                values.insert(key.clone(), v);
            }
            Err(e) => return Some(Err(e)),
        }
    }
    Some(CompositeData::new(composite.clone(), values))
}
