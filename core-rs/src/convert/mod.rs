//! Conversion between internal values and the external type system

pub mod open_type;
pub mod registry;

pub use open_type::{
    CompositeData, CompositeItem, CompositeType, OpenType, OpenValue, SimpleType, TabularData, TabularType,
};
pub use registry::{ConversionMode, TypeConverters};
