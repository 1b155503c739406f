//! Access decisions
//!
//! The bridge never decides authorization itself. It asks an [`AccessControl`]
//! service for an [`AccessDecision`] per resource path and gates traversal,
//! attribute visibility and operation execution on the answer.
//! [`PermissionChecker`] is the policy-driven service used by the in-memory kernel.

pub mod permission_checker;

pub use permission_checker::{AccessPolicy, AccessRule, PermissionChecker};

use crate::model::ResourcePath;
use std::collections::BTreeSet;

/// Per-path authorization answer; recomputed on every call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessDecision {
    pub addressable: bool,
    pub readable_attributes: BTreeSet<String>,
    pub writable_attributes: BTreeSet<String>,
    /// Empty unless the decision was requested with operations
    pub executable_operations: BTreeSet<String>,
}

impl AccessDecision {
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn can_read(&self, attribute: &str) -> bool {
        self.addressable && self.readable_attributes.contains(attribute)
    }

    pub fn can_write(&self, attribute: &str) -> bool {
        self.addressable && self.writable_attributes.contains(attribute)
    }

    pub fn can_execute(&self, operation: &str) -> bool {
        self.addressable && self.executable_operations.contains(operation)
    }
}

/// Access-decision service
pub trait AccessControl: Send + Sync {
    fn decide(&self, path: &ResourcePath, include_operations: bool) -> AccessDecision;
}
