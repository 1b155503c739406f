//! Resource path <-> external name codec
//!
//! Keys escape the five structural characters `* ? : = ,` as `%x<hex>`.
//! Values that contain a character with meaning in the name grammar are
//! double-quoted, with `* \ ? "` and newline backslash-escaped inside the quotes.
//! The empty path maps to the reserved root name `<domain>:management-root=server`.
//!
//! Decoding needs the live tree: the external name does not preserve the
//! hierarchical order of the path, so the codec searches the remaining
//! properties against the actual children at each level.

use crate::errors::{BridgeError, Result};
use crate::kernel::ResourceTree;
use crate::model::{PathElement, ResourcePath};
use crate::naming::object_name::ExternalName;

/// Key of the reserved root name
pub const ROOT_KEY: &str = "management-root";
/// Value of the reserved root name
pub const ROOT_VALUE: &str = "server";

const KEY_RESERVED: [char; 5] = ['*', '?', ':', '=', ','];
const VALUE_QUOTE_TRIGGERS: [char; 8] = ['*', '\\', ':', '=', '\n', '"', ',', '?'];
const ESCAPE_MARKER: &str = "%x";

/// Replace each reserved key character with `%x<hex>`
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if KEY_RESERVED.contains(&c) {
            out.push_str(ESCAPE_MARKER);
            out.push_str(&hex::encode([c as u8]));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse [`escape_key`]; keys without a `%x` token are returned unchanged
pub fn unescape_key(key: &str) -> String {
    if !key.contains(ESCAPE_MARKER) {
        return key.to_string();
    }
    let mut out = key.to_string();
    for c in KEY_RESERVED {
        let token = format!("{}{}", ESCAPE_MARKER, hex::encode([c as u8]));
        out = out.replace(&token, &c.to_string());
    }
    out
}

/// Quote a value when it contains a character with meaning in the name grammar
pub fn quote_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(VALUE_QUOTE_TRIGGERS) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '*' | '\\' | '?' | '"' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Reverse [`quote_value`]; unquoted values are returned unchanged
pub fn unquote_value(value: &str) -> String {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) if value.len() >= 2 => inner,
        _ => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Address codec for one external domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCodec {
    domain: String,
}

impl AddressCodec {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Name of the empty path
    pub fn root_name(&self) -> ExternalName {
        ExternalName::single(self.domain.clone(), ROOT_KEY, ROOT_VALUE)
    }

    pub fn is_root_name(&self, name: &ExternalName) -> bool {
        name.domain() == self.domain
            && !name.is_property_list_pattern()
            && name.properties().len() == 1
            && name.property(ROOT_KEY) == Some(ROOT_VALUE)
    }

    /// Encode a resource path
    ///
    /// # Errors
    /// `MalformedName` when the path repeats a key, which the flat name cannot express
    pub fn encode(&self, path: &ResourcePath) -> Result<ExternalName> {
        if path.is_empty() {
            return Ok(self.root_name());
        }
        let properties = path
            .iter()
            .map(|e| (escape_key(&e.key), quote_value(&e.value)))
            .collect();
        ExternalName::new(self.domain.clone(), properties).map_err(|e| {
            BridgeError::MalformedName(format!("Cannot encode {}: {}", path, e))
        })
    }

    /// The `(key, value)` elements a name carries, unescaped, in name order
    pub fn elements(&self, name: &ExternalName) -> Vec<PathElement> {
        name.properties()
            .iter()
            .map(|(k, v)| PathElement::new(unescape_key(k), unquote_value(v)))
            .collect()
    }

    /// Decode a name to the path of an existing resource
    ///
    /// Returns `None` when the name belongs to another domain, is a pattern,
    /// or does not correspond to a resource in `tree`.
    pub fn decode(&self, name: &ExternalName, tree: &dyn ResourceTree) -> Option<ResourcePath> {
        if name.domain() != self.domain || name.is_pattern() {
            return None;
        }
        if self.is_root_name(name) {
            return Some(ResourcePath::root());
        }
        let remaining = self.elements(name);
        search(tree, ResourcePath::root(), remaining)
    }
}

fn search(tree: &dyn ResourceTree, path: ResourcePath, remaining: Vec<PathElement>) -> Option<ResourcePath> {
    if remaining.is_empty() {
        return Some(path);
    }
    for (i, element) in remaining.iter().enumerate() {
        let candidate = path.append(element.clone());
        if !tree.has_resource(&candidate) {
            continue;
        }
        let mut rest = remaining.clone();
        rest.remove(i);
        if let Some(found) = search(tree, candidate, rest) {
            return Some(found);
        }
    }
    None
}
