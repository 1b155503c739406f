//! Metadata documents
//!
//! Self-describing schema attached to a resource type: attribute definitions,
//! operation signatures and the child types that may be created beneath it.
//! The serde shape is the one used by model snapshots:
//!
//! ```yaml
//! description: A network binding
//! attributes:
//!   - name: port
//!     type: INT64
//!     access: READ_WRITE
//! operations:
//!   - name: set-port-offset
//!     parameters: [{name: offset, type: INT64}]
//!     reply: {type: INT64}
//! children:
//!   - key: worker
//!     value: "*"
//!     add: {name: add, parameters: [{name: size, type: INT64}]}
//! ```

use crate::model::path::PathElement;
use crate::model::value::ValueKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Operation that creates a resource
pub const ADD: &str = "add";
/// Operation that removes a resource
pub const REMOVE: &str = "remove";
pub const READ_ATTRIBUTE: &str = "read-attribute";
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
pub const READ_RESOURCE: &str = "read-resource";
/// Operation that describes a resource's own shape
pub const READ_RESOURCE_DESCRIPTION: &str = "read-resource-description";

/// Declared type of an attribute, parameter or reply
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeDescriptor {
    #[serde(rename = "type", default)]
    pub kind: ValueKind,

    #[serde(rename = "value-type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
}

/// Nested type of OBJECT, LIST and PROPERTY descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueType {
    /// Every element (or map value) has this kind
    Simple(ValueKind),
    /// A record whose fields are described individually
    Complex(IndexMap<String, FieldDescriptor>),
}

/// One field of a complex record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(default)]
    pub description: String,

    #[serde(flatten)]
    pub type_descriptor: TypeDescriptor,
}

impl TypeDescriptor {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind, value_type: None }
    }

    pub fn with_value_type(kind: ValueKind, value_type: ValueType) -> Self {
        Self {
            kind,
            value_type: Some(value_type),
        }
    }

    /// Descriptor of a LIST element, a map value or a PROPERTY value
    pub fn element(&self) -> TypeDescriptor {
        match &self.value_type {
            None => TypeDescriptor::new(ValueKind::Undefined),
            Some(ValueType::Simple(kind)) => TypeDescriptor::new(*kind),
            Some(ValueType::Complex(fields)) => {
                TypeDescriptor::with_value_type(ValueKind::Object, ValueType::Complex(fields.clone()))
            }
        }
    }
}

impl FieldDescriptor {
    pub fn new(description: impl Into<String>, type_descriptor: TypeDescriptor) -> Self {
        Self {
            description: description.into(),
            type_descriptor,
        }
    }
}

/// How an attribute may be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    #[default]
    ReadOnly,
    ReadWrite,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(flatten)]
    pub type_descriptor: TypeDescriptor,

    #[serde(default)]
    pub access: AccessType,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, kind: ValueKind, access: AccessType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            type_descriptor: TypeDescriptor::new(kind),
            access,
        }
    }

    pub fn with_type(mut self, type_descriptor: TypeDescriptor) -> Self {
        self.type_descriptor = type_descriptor;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_writable(&self) -> bool {
        self.access == AccessType::ReadWrite
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(flatten)]
    pub type_descriptor: TypeDescriptor,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            type_descriptor: TypeDescriptor::new(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Parameters in declared order; invocation matches them positionally
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<TypeDescriptor>,

    /// Safe to invoke when the bridge runs read-only
    #[serde(default)]
    pub read_only: bool,
}

impl OperationDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            reply: None,
            read_only: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_reply(mut self, reply: TypeDescriptor) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// A child type that may exist beneath a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRegistration {
    pub key: String,

    /// `*` for a wildcard child type
    #[serde(default = "wildcard_value")]
    pub value: String,

    /// Creation operation, when the child type supports creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<OperationDefinition>,
}

fn wildcard_value() -> String {
    PathElement::WILDCARD_VALUE.to_string()
}

impl ChildRegistration {
    pub fn element(&self) -> PathElement {
        PathElement::new(self.key.clone(), self.value.clone())
    }
}

/// Per-resource-type description
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,

    #[serde(default)]
    pub operations: Vec<OperationDefinition>,

    #[serde(default)]
    pub children: Vec<ChildRegistration>,
}

impl MetadataDocument {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_operation(mut self, operation: OperationDefinition) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_child(mut self, child: ChildRegistration) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDefinition> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Registration matching a concrete child element (exact value first, then wildcard)
    pub fn child(&self, element: &PathElement) -> Option<&ChildRegistration> {
        self.children
            .iter()
            .find(|c| c.key == element.key && c.value == element.value)
            .or_else(|| {
                self.children
                    .iter()
                    .find(|c| c.key == element.key && c.value == PathElement::WILDCARD_VALUE)
            })
    }
}
