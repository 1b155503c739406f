//! Policy-driven access decisions
//!
//! An [`AccessPolicy`] is a list of rules keyed by resource path patterns.
//! Patterns use `*` as a wildcard over the `/key=value` text form, so
//! `/subsystem=secure` denies one resource while `/subsystem=*` matches every
//! subsystem. Attribute and operation names in a rule may carry wildcards too.
//!
//! ```yaml
//! rules:
//!   - path: /subsystem=secure
//!     addressable: false
//!   - path: /subsystem=net
//!     denyRead: [secret]
//!     denyWrite: [port]
//!     denyOperations: ["reload*"]
//! ```

use crate::errors::Result;
use crate::model::metadata::{ADD, REMOVE};
use crate::model::{MetadataDocument, ResourcePath};
use crate::rbac::AccessDecision;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One access rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    /// Resource path pattern (text form, `*` wildcards)
    pub path: String,

    #[serde(default = "default_addressable")]
    pub addressable: bool,

    #[serde(default)]
    pub deny_read: Vec<String>,

    #[serde(default)]
    pub deny_write: Vec<String>,

    #[serde(default)]
    pub deny_operations: Vec<String>,
}

fn default_addressable() -> bool {
    true
}

impl AccessRule {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            addressable: true,
            deny_read: Vec::new(),
            deny_write: Vec::new(),
            deny_operations: Vec::new(),
        }
    }

    pub fn hidden(path: impl Into<String>) -> Self {
        Self {
            addressable: false,
            ..Self::new(path)
        }
    }
}

/// Ordered set of access rules; every matching rule applies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Evaluates an [`AccessPolicy`] against resource paths and metadata
pub struct PermissionChecker {
    policy: AccessPolicy,
    pattern_cache: Mutex<HashMap<String, Regex>>,
}

impl PermissionChecker {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy,
            pattern_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide access to the resource at `path`
    ///
    /// # Arguments
    /// * `path` - Resource path being accessed
    /// * `metadata` - Metadata of the resource type; without it only addressability is decided
    /// * `include_operations` - Also compute the executable operation set
    ///
    /// # Returns
    /// Access decision; a pattern that fails to compile denies access
    pub fn decide(
        &self,
        path: &ResourcePath,
        metadata: Option<&MetadataDocument>,
        include_operations: bool,
    ) -> AccessDecision {
        match self.try_decide(path, metadata, include_operations) {
            Ok(decision) => decision,
            Err(e) => {
                // Fail closed
                debug!(path = %path, error = %e, "access policy evaluation failed");
                AccessDecision::denied()
            }
        }
    }

    /// Match text against a pattern with `*` wildcards
    ///
    /// # Arguments
    /// * `text` - Path text, attribute name or operation name
    /// * `pattern` - Pattern with optional wildcards
    ///
    /// # Returns
    /// true if the text matches the pattern
    pub fn matches_pattern(&self, text: &str, pattern: &str) -> Result<bool> {
        if text == pattern {
            return Ok(true);
        }
        if !pattern.contains('*') {
            return Ok(false);
        }

        let mut cache = self.pattern_cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.is_match(text));
        }

        let regex_pattern = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", regex_pattern))?;
        let matched = regex.is_match(text);
        cache.insert(pattern.to_string(), regex);
        Ok(matched)
    }

    // ===== PRIVATE HELPER METHODS =====

    fn try_decide(
        &self,
        path: &ResourcePath,
        metadata: Option<&MetadataDocument>,
        include_operations: bool,
    ) -> Result<AccessDecision> {
        let path_text = path.to_string();
        let mut rules = Vec::new();
        for rule in &self.policy.rules {
            if self.matches_pattern(&path_text, &rule.path)? {
                rules.push(rule);
            }
        }

        if rules.iter().any(|r| !r.addressable) {
            return Ok(AccessDecision::denied());
        }

        let mut decision = AccessDecision {
            addressable: true,
            ..AccessDecision::default()
        };
        let Some(metadata) = metadata else {
            return Ok(decision);
        };

        for attribute in &metadata.attributes {
            let name = attribute.name.as_str();
            if !self.denied_by(&rules, name, |r| &r.deny_read)? {
                decision.readable_attributes.insert(name.to_string());
            }
            if !self.denied_by(&rules, name, |r| &r.deny_write)? {
                decision.writable_attributes.insert(name.to_string());
            }
        }

        if include_operations {
            let names = metadata
                .operations
                .iter()
                .map(|o| o.name.as_str())
                .chain([ADD, REMOVE]);
            for name in names {
                if !self.denied_by(&rules, name, |r| &r.deny_operations)? {
                    decision.executable_operations.insert(name.to_string());
                }
            }
        }

        Ok(decision)
    }

    fn denied_by<F>(&self, rules: &[&AccessRule], name: &str, list: F) -> Result<bool>
    where
        F: Fn(&AccessRule) -> &Vec<String>,
    {
        for rule in rules {
            for pattern in list(rule) {
                if self.matches_pattern(name, pattern)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
