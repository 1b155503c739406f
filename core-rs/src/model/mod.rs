//! Internal management model
//!
//! Resource paths, dynamically typed values, metadata documents and
//! expression handling: the vocabulary the management kernel speaks.

pub mod expression;
pub mod metadata;
pub mod path;
pub mod value;

pub use expression::{is_possible_expression, is_vault_expression, ExpressionResolver};
pub use metadata::{
    AccessType, AttributeDefinition, ChildRegistration, FieldDescriptor, MetadataDocument,
    OperationDefinition, ParameterDefinition, TypeDescriptor, ValueType,
};
pub use path::{PathElement, ResourcePath};
pub use value::{Value, ValueKind};
