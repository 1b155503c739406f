//! External naming
//!
//! - [`ExternalName`]: the flat `domain:key=value,...` names of the external protocol
//! - [`AddressCodec`]: reversible mapping between resource paths and external names
//! - [`case`]: kebab-case <-> camelCase identifier conversion

pub mod case;
pub mod codec;
pub mod object_name;

pub use case::{add_operation_name, camel_to_kebab, kebab_to_camel};
pub use codec::{escape_key, quote_value, unescape_key, unquote_value, AddressCodec, ROOT_KEY, ROOT_VALUE};
pub use object_name::ExternalName;
