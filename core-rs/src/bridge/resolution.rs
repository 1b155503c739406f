//! External to internal name resolution
//!
//! Operation names are resolved by trying each strategy in
//! [`OPERATION_STRATEGIES`] in order; the first hit wins. Only when every
//! declared-operation strategy misses is the name looked up among the
//! synthesized child creation operations.

use crate::descriptor::{find_child_add_operation, ChildAddOperation};
use crate::model::{AttributeDefinition, MetadataDocument, OperationDefinition};
use crate::naming::{camel_to_kebab, kebab_to_camel};

/// A pure lookup of a declared operation by external name
pub type OperationStrategy = for<'a> fn(&str, &'a MetadataDocument) -> Option<&'a OperationDefinition>;

/// Declared-operation strategies, in the order they are tried
pub const OPERATION_STRATEGIES: &[(&str, OperationStrategy)] = &[
    ("exact", exact_operation),
    ("converted", converted_operation),
    ("scan", scanned_operation),
];

/// What an external operation name resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum OperationTarget<'a> {
    Declared(&'a OperationDefinition),
    ChildAdd(ChildAddOperation<'a>),
}

/// Resolve an external operation name against a resource's metadata
pub fn resolve_operation<'a>(name: &str, metadata: &'a MetadataDocument) -> Option<OperationTarget<'a>> {
    for (strategy, lookup) in OPERATION_STRATEGIES {
        if let Some(definition) = lookup(name, metadata) {
            tracing::debug!(operation = name, strategy = *strategy, resolved = %definition.name, "Resolved operation");
            return Some(OperationTarget::Declared(definition));
        }
    }
    find_child_add_operation(metadata, name).map(OperationTarget::ChildAdd)
}

/// Resolve an external attribute name: exact match, then a scan comparing
/// each declared name's camelCase form
pub fn resolve_attribute<'a>(name: &str, metadata: &'a MetadataDocument) -> Option<&'a AttributeDefinition> {
    metadata
        .attribute(name)
        .or_else(|| metadata.attributes.iter().find(|a| kebab_to_camel(&a.name) == name))
}

fn exact_operation<'a>(name: &str, metadata: &'a MetadataDocument) -> Option<&'a OperationDefinition> {
    metadata.operation(name)
}

fn converted_operation<'a>(name: &str, metadata: &'a MetadataDocument) -> Option<&'a OperationDefinition> {
    metadata.operation(&camel_to_kebab(name))
}

fn scanned_operation<'a>(name: &str, metadata: &'a MetadataDocument) -> Option<&'a OperationDefinition> {
    metadata.operations.iter().find(|o| kebab_to_camel(&o.name) == name)
}
