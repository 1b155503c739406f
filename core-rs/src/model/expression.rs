//! Expression detection and resolution
//!
//! Expressions are strings carrying `${...}` placeholders:
//!
//! - `${name}` - property lookup, failure when unset
//! - `${name:default}` - property lookup with a default
//! - `${a,b:default}` - first property that is set, else the default
//! - `${env.VAR}` - process environment variable
//!
//! Vault references (`${VAULT::block::attribute::share}`) are secrets and are
//! never resolved by the bridge.

use crate::errors::{BridgeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::env;

static VAULT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{VAULT::.*::.*::.*\}$").expect("vault pattern is valid"));

const ENV_PREFIX: &str = "env.";

/// A string that contains `${` followed later by `}`
pub fn is_possible_expression(s: &str) -> bool {
    match s.find("${") {
        Some(start) => s[start..].contains('}'),
        None => false,
    }
}

/// A vault secret reference
pub fn is_vault_expression(s: &str) -> bool {
    VAULT_PATTERN.is_match(s)
}

/// Resolves expressions against configured properties and the environment
#[derive(Debug, Clone, Default)]
pub struct ExpressionResolver {
    properties: HashMap<String, String>,
}

impl ExpressionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Resolve every placeholder in `expression`
    ///
    /// # Errors
    ///
    /// `TypeConversion` when a placeholder has no value and no default, when a
    /// placeholder is unterminated, or when the expression is a vault reference.
    pub fn resolve(&self, expression: &str) -> Result<String> {
        if is_vault_expression(expression) {
            return Err(BridgeError::TypeConversion(format!(
                "Vault expression {} cannot be resolved",
                expression
            )));
        }

        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let body_start = start + 2;
            let end = find_closing_brace(&rest[body_start..]).ok_or_else(|| {
                BridgeError::TypeConversion(format!("Unterminated expression: {}", expression))
            })?;
            let body = &rest[body_start..body_start + end];
            out.push_str(&self.resolve_placeholder(body, expression)?);
            rest = &rest[body_start + end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve_placeholder(&self, body: &str, expression: &str) -> Result<String> {
        let (names, default) = match body.split_once(':') {
            Some((names, default)) => (names, Some(default)),
            None => (body, None),
        };

        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if let Some(value) = self.lookup(name) {
                return Ok(value);
            }
        }

        match default {
            // defaults may themselves carry placeholders
            Some(default) if is_possible_expression(default) => self.resolve(default),
            Some(default) => Ok(default.to_string()),
            None => Err(BridgeError::TypeConversion(format!(
                "Cannot resolve expression {}",
                expression
            ))),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.properties.get(name) {
            return Some(value.clone());
        }
        if let Some(var) = name.strip_prefix(ENV_PREFIX) {
            return env::var(var).ok();
        }
        None
    }
}

fn find_closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 1;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}
