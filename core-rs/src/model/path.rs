//! Resource paths
//!
//! A resource path is an ordered list of `key=value` elements. The empty
//! path addresses the root of the tree. The text form used in snapshots,
//! configuration and log lines is `/key=value/key=value` (`/` for the root).

use crate::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One `(type-key, instance-value)` segment of a resource path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    pub key: String,
    pub value: String,
}

impl PathElement {
    /// Instance value used by registrations whose instances are created dynamically
    pub const WILDCARD_VALUE: &'static str = "*";

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, Self::WILDCARD_VALUE)
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == Self::WILDCARD_VALUE
    }

    /// Whether this element, read as a pattern, matches a concrete element
    pub fn matches(&self, other: &PathElement) -> bool {
        self.key == other.key && (self.is_wildcard() || self.value == other.value)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered sequence of path elements; order matters for equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath {
    elements: Vec<PathElement>,
}

impl ResourcePath {
    /// The empty path (tree root)
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Build a path from `(key, value)` pairs
    ///
    /// # Example
    ///
    /// ```
    /// use model_bridge::ResourcePath;
    ///
    /// let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    /// assert_eq!(path.to_string(), "/subsystem=net/binding=http");
    /// ```
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            elements: pairs.iter().map(|(k, v)| PathElement::new(*k, *v)).collect(),
        }
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// New path with `element` appended
    pub fn append(&self, element: PathElement) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self { elements }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &ResourcePath) -> bool {
        self.len() < other.len() && other.elements[..self.len()] == self.elements[..]
    }

    /// Match a concrete path against this path read as a pattern (wildcard values)
    pub fn matches(&self, concrete: &ResourcePath) -> bool {
        self.len() == concrete.len()
            && self
                .elements
                .iter()
                .zip(concrete.elements.iter())
                .all(|(p, c)| p.matches(c))
    }

    /// Number of wildcard elements; fewer means a more specific pattern
    pub fn wildcard_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_wildcard()).count()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        for element in &self.elements {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}

impl FromStr for ResourcePath {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::root());
        }
        let body = trimmed.strip_prefix('/').ok_or_else(|| {
            BridgeError::MalformedName(format!("Resource path must start with '/': {}", s))
        })?;

        let mut elements = Vec::new();
        for segment in body.split('/') {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                BridgeError::MalformedName(format!("Path segment '{}' is not key=value", segment))
            })?;
            if key.is_empty() || value.is_empty() {
                return Err(BridgeError::MalformedName(format!(
                    "Path segment '{}' has an empty key or value",
                    segment
                )));
            }
            elements.push(PathElement::new(key, value));
        }
        Ok(Self { elements })
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}

impl<'a> IntoIterator for &'a ResourcePath {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
