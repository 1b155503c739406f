//! Synthesized child creation operations
//!
//! A child type that declares an `add` operation is exposed on its parent as
//! an extra operation, `add<ChildType>` for wildcard child types and
//! `add<ChildType><Value>` for fixed ones.

use crate::model::{MetadataDocument, OperationDefinition, PathElement};
use crate::naming::add_operation_name;

/// A creation operation found among a resource's child registrations
#[derive(Debug, Clone, PartialEq)]
pub struct ChildAddOperation<'a> {
    pub external_name: String,
    pub element: PathElement,
    pub operation: &'a OperationDefinition,
}

impl ChildAddOperation<'_> {
    /// Wildcard child types take the new instance name as a leading parameter
    pub fn takes_name_parameter(&self) -> bool {
        self.element.is_wildcard()
    }
}

/// Every child creation operation of a resource, in declaration order
pub fn find_child_add_operations(metadata: &MetadataDocument) -> Vec<ChildAddOperation<'_>> {
    metadata
        .children
        .iter()
        .filter_map(|child| {
            child.add.as_ref().map(|operation| {
                let element = child.element();
                ChildAddOperation {
                    external_name: add_operation_name(&element),
                    element,
                    operation,
                }
            })
        })
        .collect()
}

/// The child creation operation exposed as `external_name`
pub fn find_child_add_operation<'a>(
    metadata: &'a MetadataDocument,
    external_name: &str,
) -> Option<ChildAddOperation<'a>> {
    find_child_add_operations(metadata)
        .into_iter()
        .find(|op| op.external_name == external_name)
}
