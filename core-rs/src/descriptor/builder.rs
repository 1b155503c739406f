//! Entity descriptor construction
//!
//! Descriptors are derived from metadata on every call and never cached:
//! the tree and its access decisions may change between calls.

use crate::config::BridgePolicy;
use crate::convert::{OpenType, TypeConverters};
use crate::descriptor::child_add::find_child_add_operations;
use crate::model::metadata::{ADD, READ_RESOURCE_DESCRIPTION};
use crate::model::{MetadataDocument, ParameterDefinition, ResourcePath, ValueKind, TypeDescriptor};
use crate::naming::kebab_to_camel;
use crate::rbac::AccessDecision;
use serde_json::{json, Value as JsonValue};

/// Global operations that are hidden on the root descriptor; the bridge's
/// own get/set/invoke surface already covers them
pub const ROOT_GLOBAL_OPERATIONS: &[&str] = &[
    "read-resource",
    "read-attribute",
    "write-attribute",
    "undefine-attribute",
    "read-children-names",
    "read-children-types",
    "read-children-resources",
    "read-operation-names",
    "read-operation-description",
    "map-get",
    "map-put",
    "map-remove",
    "map-clear",
    "list-get",
    "list-add",
    "list-remove",
    "list-clear",
    "query",
];

const NAME_PARAMETER_DESCRIPTION: &str = "The name of the resource to add";

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    /// External (camelCase) name
    pub name: String,
    pub description: String,
    pub open_type: OpenType,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub description: String,
    pub open_type: OpenType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationInfo {
    /// External (camelCase) name
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: Option<OpenType>,
}

/// Externally visible shape of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub description: String,
    pub attributes: Vec<AttributeInfo>,
    pub operations: Vec<OperationInfo>,
}

impl EntityDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn to_json(&self) -> JsonValue {
        let attributes: Vec<JsonValue> = self
            .attributes
            .iter()
            .map(|a| {
                json!({
                    "name": a.name,
                    "description": a.description,
                    "type": a.open_type.to_json(),
                    "readable": a.readable,
                    "writable": a.writable,
                })
            })
            .collect();
        let operations: Vec<JsonValue> = self
            .operations
            .iter()
            .map(|o| {
                let parameters: Vec<JsonValue> = o
                    .parameters
                    .iter()
                    .map(|p| json!({"name": p.name, "description": p.description, "type": p.open_type.to_json()}))
                    .collect();
                json!({
                    "name": o.name,
                    "description": o.description,
                    "parameters": parameters,
                    "returnType": o.return_type.as_ref().map(OpenType::to_json),
                })
            })
            .collect();
        json!({
            "description": self.description,
            "attributes": attributes,
            "operations": operations,
        })
    }
}

/// Builds [`EntityDescriptor`]s for one domain
pub struct DescriptorBuilder<'a> {
    converters: &'a TypeConverters,
    policy: BridgePolicy,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(converters: &'a TypeConverters, policy: BridgePolicy) -> Self {
        Self { converters, policy }
    }

    /// Describe the resource at `path`
    ///
    /// # Arguments
    /// * `path` - Resource being described; the root hides global operations
    /// * `metadata` - Metadata document of the resource
    /// * `decision` - Access decision for the resource, queried with operations
    pub fn build(
        &self,
        path: &ResourcePath,
        metadata: &MetadataDocument,
        decision: &AccessDecision,
    ) -> EntityDescriptor {
        EntityDescriptor {
            description: metadata.description.clone(),
            attributes: self.attributes(metadata, decision),
            operations: self.operations(path, metadata, decision),
        }
    }

    // ===== PRIVATE HELPER METHODS =====

    fn attributes(&self, metadata: &MetadataDocument, decision: &AccessDecision) -> Vec<AttributeInfo> {
        metadata
            .attributes
            .iter()
            .map(|attribute| {
                let mut writable = self.policy.writable && attribute.is_writable();
                if self.policy.enforce_access_control {
                    writable = writable && decision.writable_attributes.contains(&attribute.name);
                }
                AttributeInfo {
                    name: kebab_to_camel(&attribute.name),
                    description: attribute.description.clone(),
                    open_type: self.converters.describe(&attribute.type_descriptor),
                    readable: true,
                    writable,
                }
            })
            .collect()
    }

    fn operations(
        &self,
        path: &ResourcePath,
        metadata: &MetadataDocument,
        decision: &AccessDecision,
    ) -> Vec<OperationInfo> {
        let mut operations = Vec::new();
        for operation in &metadata.operations {
            let name = operation.name.as_str();
            if name == ADD || name == READ_RESOURCE_DESCRIPTION {
                continue;
            }
            if path.is_empty() && ROOT_GLOBAL_OPERATIONS.contains(&name) {
                continue;
            }
            if !self.policy.writable && !operation.read_only {
                continue;
            }
            if self.policy.enforce_access_control && !decision.executable_operations.contains(name) {
                continue;
            }
            operations.push(OperationInfo {
                name: kebab_to_camel(name),
                description: operation.description.clone(),
                parameters: self.parameters(&operation.parameters),
                return_type: operation.reply.as_ref().map(|r| self.converters.describe(r)),
            });
        }

        if self.policy.writable {
            for child_add in find_child_add_operations(metadata) {
                let mut parameters = Vec::new();
                if child_add.takes_name_parameter() {
                    parameters.push(ParameterInfo {
                        name: "name".to_string(),
                        description: NAME_PARAMETER_DESCRIPTION.to_string(),
                        open_type: self.converters.describe(&TypeDescriptor::new(ValueKind::String)),
                    });
                }
                parameters.extend(self.parameters(&child_add.operation.parameters));
                operations.push(OperationInfo {
                    name: child_add.external_name.clone(),
                    description: child_add.operation.description.clone(),
                    parameters,
                    return_type: child_add.operation.reply.as_ref().map(|r| self.converters.describe(r)),
                });
            }
        }
        operations
    }

    fn parameters(&self, parameters: &[ParameterDefinition]) -> Vec<ParameterInfo> {
        parameters
            .iter()
            .map(|p| ParameterInfo {
                name: p.name.clone(),
                description: p.description.clone(),
                open_type: self.converters.describe(&p.type_descriptor),
            })
            .collect()
    }
}
