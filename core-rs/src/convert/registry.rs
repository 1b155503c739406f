//! Type conversion registry
//!
//! Maps type descriptors to converters between internal [`Value`]s and
//! external [`OpenValue`]s. Two modes exist and a registry is fixed to one:
//!
//! - **Legacy**: expressions are resolved eagerly when a value leaves the
//!   kernel; simple types keep their natural external type.
//! - **Expression-aware**: every simple type is exposed as a string so that
//!   `${...}` expressions travel unresolved in both directions.
//!
//! `encode` converts internal to external, `decode` external to internal.

use crate::convert::open_type::{
    CompositeData, CompositeType, OpenType, OpenValue, SimpleType, TabularData, TabularType,
};
use crate::errors::{BridgeError, Result};
use crate::model::expression::{is_possible_expression, is_vault_expression, ExpressionResolver};
use crate::model::{FieldDescriptor, TypeDescriptor, Value, ValueKind, ValueType};
use indexmap::IndexMap;

const NO_DESCRIPTION: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// Resolve expressions eagerly; PROPERTY values become composites only with the proper format
    Legacy { proper_property_format: bool },
    /// Represent simple values as strings and keep expressions unresolved
    Expression,
}

/// Converter chosen for a type descriptor
enum Converter<'a> {
    Simple(ValueKind),
    Bytes,
    /// Structured text of the whole value
    Text,
    Property(TypeDescriptor),
    Map(TypeDescriptor),
    Complex(&'a IndexMap<String, FieldDescriptor>),
    List(TypeDescriptor),
}

/// Converters for one external domain
#[derive(Debug, Clone)]
pub struct TypeConverters {
    mode: ConversionMode,
    resolver: ExpressionResolver,
}

impl TypeConverters {
    pub fn legacy(proper_property_format: bool) -> Self {
        Self {
            mode: ConversionMode::Legacy { proper_property_format },
            resolver: ExpressionResolver::new(),
        }
    }

    pub fn expression_aware() -> Self {
        Self {
            mode: ConversionMode::Expression,
            resolver: ExpressionResolver::new(),
        }
    }

    /// Resolver used by legacy converters
    pub fn with_resolver(mut self, resolver: ExpressionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    pub fn is_expression_aware(&self) -> bool {
        self.mode == ConversionMode::Expression
    }

    /// External type of values described by `td`
    pub fn describe(&self, td: &TypeDescriptor) -> OpenType {
        match self.converter(td) {
            Converter::Simple(kind) => {
                if self.is_expression_aware() {
                    OpenType::string()
                } else {
                    OpenType::Simple(simple_type(kind))
                }
            }
            Converter::Bytes => OpenType::Bytes,
            Converter::Text => OpenType::string(),
            Converter::Property(element) => OpenType::Composite(self.property_type(&element)),
            Converter::Map(element) => OpenType::Tabular(self.map_type(&element)),
            Converter::Complex(fields) => OpenType::Composite(self.complex_type(fields)),
            Converter::List(element) => OpenType::array_of(self.describe(&element)),
        }
    }

    /// Internal value to external value
    ///
    /// # Errors
    /// `TypeConversion` when the value does not have the declared shape or an
    /// expression cannot be resolved
    pub fn encode(&self, td: &TypeDescriptor, value: &Value) -> Result<OpenValue> {
        if !value.is_defined() {
            return Ok(OpenValue::Null);
        }
        match self.converter(td) {
            Converter::Simple(kind) => self.encode_simple(kind, value),
            Converter::Bytes => match value {
                Value::Bytes(bytes) => Ok(OpenValue::Bytes(bytes.clone())),
                other => Err(shape_error(td, other)),
            },
            Converter::Text => Ok(OpenValue::String(value.to_json_string())),
            Converter::Property(element) => {
                let (name, inner) = match value {
                    Value::Property(name, inner) => (name.as_str(), inner.as_ref()),
                    Value::Object(map) if map.len() == 1 => match map.iter().next() {
                        Some((name, inner)) => (name.as_str(), inner),
                        None => return Err(shape_error(td, value)),
                    },
                    other => return Err(shape_error(td, other)),
                };
                let mut items = IndexMap::new();
                items.insert("name".to_string(), OpenValue::string(name));
                items.insert("value".to_string(), self.encode(&element, inner)?);
                Ok(OpenValue::Composite(CompositeData::new(self.property_type(&element), items)?))
            }
            Converter::Map(element) => {
                let Value::Object(map) = value else {
                    return Err(shape_error(td, value));
                };
                let tabular_type = self.map_type(&element);
                let row_type = tabular_type.row_type.clone();
                let mut table = TabularData::new(tabular_type);
                for (key, entry) in map {
                    let mut row = IndexMap::new();
                    row.insert("key".to_string(), OpenValue::string(key.clone()));
                    row.insert("value".to_string(), self.encode(&element, entry)?);
                    table.put(CompositeData::new(row_type.clone(), row)?)?;
                }
                Ok(OpenValue::Tabular(table))
            }
            Converter::Complex(fields) => {
                let Value::Object(map) = value else {
                    return Err(shape_error(td, value));
                };
                let mut items = IndexMap::new();
                for (name, field) in fields {
                    let item = match map.get(name) {
                        Some(v) => self.encode(&field.type_descriptor, v)?,
                        None => OpenValue::Null,
                    };
                    items.insert(name.clone(), item);
                }
                Ok(OpenValue::Composite(CompositeData::new(self.complex_type(fields), items)?))
            }
            Converter::List(element) => {
                let Value::List(items) = value else {
                    return Err(shape_error(td, value));
                };
                Ok(OpenValue::Array {
                    element_type: self.describe(&element),
                    values: items
                        .iter()
                        .map(|i| self.encode(&element, i))
                        .collect::<Result<Vec<_>>>()?,
                })
            }
        }
    }

    /// External value to internal value
    ///
    /// # Errors
    /// `TypeConversion` when the external value does not fit the declared type
    pub fn decode(&self, td: &TypeDescriptor, value: &OpenValue) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Undefined);
        }
        match self.converter(td) {
            Converter::Simple(kind) => self.decode_simple(kind, value),
            Converter::Bytes => match value {
                OpenValue::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
                other => Err(open_shape_error(td, other)),
            },
            Converter::Text => {
                let text = value.as_str().ok_or_else(|| open_shape_error(td, value))?;
                match Value::from_json_str(text) {
                    Ok(parsed) => Ok(parsed),
                    Err(_) if self.is_expression_aware() && is_possible_expression(text) => {
                        Ok(Value::expression(text))
                    }
                    Err(e) => Err(BridgeError::TypeConversion(format!(
                        "Invalid structured text '{}': {}",
                        text, e
                    ))),
                }
            }
            Converter::Property(element) => {
                let OpenValue::Composite(data) = value else {
                    return Err(open_shape_error(td, value));
                };
                let name = data
                    .get("name")
                    .and_then(OpenValue::as_str)
                    .ok_or_else(|| BridgeError::TypeConversion("Property composite without a name".to_string()))?;
                let inner = match data.get("value") {
                    Some(v) => self.decode(&element, v)?,
                    None => Value::Undefined,
                };
                Ok(Value::property(name, inner))
            }
            Converter::Map(element) => {
                let OpenValue::Tabular(table) = value else {
                    return Err(open_shape_error(td, value));
                };
                let mut map = IndexMap::new();
                for row in table.rows() {
                    let key = row
                        .get("key")
                        .and_then(OpenValue::as_str)
                        .ok_or_else(|| BridgeError::TypeConversion("Map row without a string key".to_string()))?;
                    let entry = match row.get("value") {
                        Some(v) => self.decode(&element, v)?,
                        None => Value::Undefined,
                    };
                    map.insert(key.to_string(), entry);
                }
                Ok(Value::Object(map))
            }
            Converter::Complex(fields) => match value {
                OpenValue::Composite(data) => {
                    let mut map = IndexMap::new();
                    for (key, item) in data.iter() {
                        let field = fields.get(key).ok_or_else(|| {
                            BridgeError::TypeConversion(format!("Unknown value key {}", key))
                        })?;
                        if item.is_null() {
                            continue;
                        }
                        map.insert(key.clone(), self.decode(&field.type_descriptor, item)?);
                    }
                    Ok(Value::Object(map))
                }
                OpenValue::String(text) => Value::from_json_str(text)
                    .map_err(|e| BridgeError::TypeConversion(format!("Invalid structured text: {}", e))),
                other => Err(open_shape_error(td, other)),
            },
            Converter::List(element) => {
                let OpenValue::Array { values, .. } = value else {
                    return Err(open_shape_error(td, value));
                };
                Ok(Value::List(
                    values
                        .iter()
                        .map(|v| self.decode(&element, v))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
        }
    }

    // ===== PRIVATE HELPER METHODS =====

    fn converter<'a>(&self, td: &'a TypeDescriptor) -> Converter<'a> {
        match td.kind {
            ValueKind::Boolean
            | ValueKind::Int64
            | ValueKind::Float64
            | ValueKind::BigDecimal
            | ValueKind::BigInteger
            | ValueKind::String => Converter::Simple(td.kind),
            ValueKind::Expression => Converter::Simple(ValueKind::String),
            ValueKind::Bytes => Converter::Bytes,
            ValueKind::Property => match self.mode {
                ConversionMode::Legacy { proper_property_format: false } => Converter::Text,
                _ => {
                    let element = td.element();
                    if element.kind == ValueKind::Undefined {
                        Converter::Property(TypeDescriptor::new(ValueKind::String))
                    } else {
                        Converter::Property(element)
                    }
                }
            },
            ValueKind::Object => match &td.value_type {
                None | Some(ValueType::Simple(ValueKind::Undefined)) => Converter::Text,
                Some(ValueType::Simple(kind)) => Converter::Map(TypeDescriptor::new(*kind)),
                Some(ValueType::Complex(fields)) => Converter::Complex(fields),
            },
            ValueKind::List => Converter::List(td.element()),
            ValueKind::Undefined => Converter::Text,
        }
    }

    fn property_type(&self, element: &TypeDescriptor) -> CompositeType {
        CompositeType::new("property", "A name/value pair")
            .with_item("name", "The property name", OpenType::string())
            .with_item("value", "The property value", self.describe(element))
    }

    fn map_type(&self, element: &TypeDescriptor) -> TabularType {
        let row_type = CompositeType::new("entry", "A map entry")
            .with_item("key", "The map key", OpenType::string())
            .with_item("value", "The map value", self.describe(element));
        TabularType {
            type_name: "map".to_string(),
            description: "A map of string keys to values".to_string(),
            row_type,
            index_names: vec!["key".to_string()],
        }
    }

    fn complex_type(&self, fields: &IndexMap<String, FieldDescriptor>) -> CompositeType {
        let mut composite = CompositeType::new("complex type", "A complex record");
        for (name, field) in fields {
            let description = if field.description.trim().is_empty() {
                NO_DESCRIPTION
            } else {
                field.description.as_str()
            };
            composite = composite.with_item(name.clone(), description, self.describe(&field.type_descriptor));
        }
        composite
    }

    fn encode_simple(&self, kind: ValueKind, value: &Value) -> Result<OpenValue> {
        if self.is_expression_aware() {
            return match value {
                Value::List(_) | Value::Object(_) | Value::Property(_, _) | Value::Bytes(_) => {
                    Err(shape_error(&TypeDescriptor::new(kind), value))
                }
                other => Ok(OpenValue::String(other.as_text())),
            };
        }

        if let Value::Expression(expression) = value {
            if is_vault_expression(expression) {
                // Vault references stay opaque; only a string can carry one
                return match kind {
                    ValueKind::String => Ok(OpenValue::String(expression.clone())),
                    _ => Err(BridgeError::TypeConversion(format!(
                        "Vault expression cannot be converted to {}",
                        kind
                    ))),
                };
            }
            let resolved = self.resolver.resolve(expression)?;
            return parse_simple(kind, &resolved);
        }

        let mismatch = || shape_error(&TypeDescriptor::new(kind), value);
        match (kind, value) {
            (ValueKind::Boolean, Value::Boolean(b)) => Ok(OpenValue::Boolean(*b)),
            (ValueKind::Int64, Value::Int64(i)) => Ok(OpenValue::Long(*i)),
            (ValueKind::Float64, Value::Float64(d)) => Ok(OpenValue::Double(*d)),
            (ValueKind::Float64, Value::Int64(i)) => Ok(OpenValue::Double(*i as f64)),
            (ValueKind::BigDecimal, Value::BigDecimal(s)) => Ok(OpenValue::BigDecimal(s.clone())),
            (ValueKind::BigDecimal, Value::Int64(i)) => Ok(OpenValue::BigDecimal(i.to_string())),
            (ValueKind::BigDecimal, Value::Float64(d)) => Ok(OpenValue::BigDecimal(d.to_string())),
            (ValueKind::BigInteger, Value::BigInteger(s)) => Ok(OpenValue::BigInteger(s.clone())),
            (ValueKind::BigInteger, Value::Int64(i)) => Ok(OpenValue::BigInteger(i.to_string())),
            (ValueKind::String, Value::List(_) | Value::Object(_) | Value::Property(_, _)) => {
                Ok(OpenValue::String(value.to_json_string()))
            }
            (ValueKind::String, Value::Bytes(_)) => Err(mismatch()),
            (ValueKind::String, other) => Ok(OpenValue::String(other.as_text())),
            (_, Value::String(s)) => parse_simple(kind, s),
            _ => Err(mismatch()),
        }
    }

    fn decode_simple(&self, kind: ValueKind, value: &OpenValue) -> Result<Value> {
        if let OpenValue::String(text) = value {
            if is_possible_expression(text) {
                if self.is_expression_aware() || kind == ValueKind::String {
                    return Ok(Value::expression(text.clone()));
                }
                return Err(BridgeError::TypeConversion(format!(
                    "Expression '{}' cannot be converted into {}",
                    text, kind
                )));
            }
            return match parse_simple(kind, text)? {
                OpenValue::Boolean(b) => Ok(Value::Boolean(b)),
                OpenValue::Long(i) => Ok(Value::Int64(i)),
                OpenValue::Double(d) => Ok(Value::Float64(d)),
                OpenValue::BigDecimal(s) => Ok(Value::BigDecimal(s)),
                OpenValue::BigInteger(s) => Ok(Value::BigInteger(s)),
                _ => Ok(Value::String(text.clone())),
            };
        }

        let mismatch = || open_shape_error(&TypeDescriptor::new(kind), value);
        match (kind, value) {
            (ValueKind::Boolean, OpenValue::Boolean(b)) => Ok(Value::Boolean(*b)),
            (ValueKind::Int64, OpenValue::Long(i)) => Ok(Value::Int64(*i)),
            (ValueKind::Float64, OpenValue::Double(d)) => Ok(Value::Float64(*d)),
            (ValueKind::Float64, OpenValue::Long(i)) => Ok(Value::Float64(*i as f64)),
            (ValueKind::BigDecimal, OpenValue::BigDecimal(s)) => Ok(Value::BigDecimal(s.clone())),
            (ValueKind::BigDecimal, OpenValue::Long(i)) => Ok(Value::BigDecimal(i.to_string())),
            (ValueKind::BigInteger, OpenValue::BigInteger(s)) => Ok(Value::BigInteger(s.clone())),
            (ValueKind::BigInteger, OpenValue::Long(i)) => Ok(Value::BigInteger(i.to_string())),
            _ => Err(mismatch()),
        }
    }
}

fn simple_type(kind: ValueKind) -> SimpleType {
    match kind {
        ValueKind::Boolean => SimpleType::Boolean,
        ValueKind::Int64 => SimpleType::Long,
        ValueKind::Float64 => SimpleType::Double,
        ValueKind::BigDecimal => SimpleType::BigDecimal,
        ValueKind::BigInteger => SimpleType::BigInteger,
        _ => SimpleType::String,
    }
}

/// Parse text into the external representation of a simple kind
fn parse_simple(kind: ValueKind, text: &str) -> Result<OpenValue> {
    let invalid = || BridgeError::TypeConversion(format!("'{}' is not a valid {}", text, kind));
    let trimmed = text.trim();
    match kind {
        ValueKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(OpenValue::Boolean(true)),
            "false" => Ok(OpenValue::Boolean(false)),
            _ => Err(invalid()),
        },
        ValueKind::Int64 => trimmed.parse().map(OpenValue::Long).map_err(|_| invalid()),
        ValueKind::Float64 => trimmed.parse().map(OpenValue::Double).map_err(|_| invalid()),
        ValueKind::BigDecimal => {
            if is_decimal(trimmed) {
                Ok(OpenValue::BigDecimal(trimmed.to_string()))
            } else {
                Err(invalid())
            }
        }
        ValueKind::BigInteger => {
            if is_integer(trimmed) {
                Ok(OpenValue::BigInteger(trimmed.to_string()))
            } else {
                Err(invalid())
            }
        }
        _ => Ok(OpenValue::String(text.to_string())),
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_decimal(text: &str) -> bool {
    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (text, None),
    };
    let unsigned = mantissa.strip_prefix(['-', '+']).unwrap_or(mantissa);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let mantissa_ok = !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit());
    mantissa_ok && exponent.map_or(true, is_integer)
}

fn shape_error(td: &TypeDescriptor, value: &Value) -> BridgeError {
    BridgeError::TypeConversion(format!("Value of kind {} does not fit type {}", value.kind(), td.kind))
}

fn open_shape_error(td: &TypeDescriptor, value: &OpenValue) -> BridgeError {
    BridgeError::TypeConversion(format!(
        "External {} value does not fit type {}",
        value.kind_name(),
        td.kind
    ))
}
