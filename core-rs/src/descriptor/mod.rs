//! Entity descriptors synthesized from metadata

pub mod builder;
pub mod child_add;

pub use builder::{
    AttributeInfo, DescriptorBuilder, EntityDescriptor, OperationInfo, ParameterInfo, ROOT_GLOBAL_OPERATIONS,
};
pub use child_add::{find_child_add_operation, find_child_add_operations, ChildAddOperation};
