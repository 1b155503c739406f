//! External entity names
//!
//! `domain:key1=value1,key2=value2` with optional property-list wildcard
//! (`domain:key=value,*` or `domain:*`). Values are either unquoted or a
//! double-quoted string with backslash escapes. The domain and unquoted values
//! may carry `*` and `?` glob characters, which makes the name a pattern.
//!
//! Two names are equal when their canonical forms are equal: the domain
//! followed by the properties sorted by key.

use crate::errors::{BridgeError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const KEY_FORBIDDEN: &[char] = &[':', '*', '?', ',', '=', '"', '\n'];
const UNQUOTED_VALUE_FORBIDDEN: &[char] = &[',', '=', ':', '"', '\n'];

/// Parsed external name; property values are kept in their escaped wire form
#[derive(Debug, Clone)]
pub struct ExternalName {
    domain: String,
    properties: Vec<(String, String)>,
    property_list_pattern: bool,
}

impl ExternalName {
    /// Build a name from already escaped properties
    ///
    /// # Errors
    /// `MalformedName` for an empty property list, an invalid key or value, or a duplicate key
    pub fn new(domain: impl Into<String>, properties: Vec<(String, String)>) -> Result<Self> {
        let name = Self {
            domain: domain.into(),
            properties,
            property_list_pattern: false,
        };
        name.validate()?;
        Ok(name)
    }

    /// Name with a single property whose key and value need no escaping
    pub(crate) fn single(domain: impl Into<String>, key: &str, value: &str) -> Self {
        Self {
            domain: domain.into(),
            properties: vec![(key.to_string(), value.to_string())],
            property_list_pattern: false,
        }
    }

    /// `domain:*`, matching every name in the domain
    pub fn domain_pattern(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            properties: Vec::new(),
            property_list_pattern: true,
        }
    }

    /// Parse the text form
    ///
    /// # Example
    /// ```
    /// use model_bridge::ExternalName;
    ///
    /// let name = ExternalName::parse("mgmt:subsystem=net,binding=\"a:b\"").unwrap();
    /// assert_eq!(name.domain(), "mgmt");
    /// assert_eq!(name.property("binding"), Some("\"a:b\""));
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let (domain, rest) = text
            .split_once(':')
            .ok_or_else(|| malformed(text, "missing ':' after domain"))?;

        let mut properties = Vec::new();
        let mut property_list_pattern = false;
        for part in split_properties(rest).map_err(|m| malformed(text, m))? {
            if part == "*" {
                if property_list_pattern {
                    return Err(malformed(text, "repeated '*'"));
                }
                property_list_pattern = true;
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| malformed(text, "property without '='"))?;
            properties.push((key.to_string(), value.to_string()));
        }

        let name = Self {
            domain: domain.to_string(),
            properties,
            property_list_pattern,
        };
        name.validate()?;
        Ok(name)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Properties in the order they were given
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_property_list_pattern(&self) -> bool {
        self.property_list_pattern
    }

    pub fn is_domain_pattern(&self) -> bool {
        self.domain.contains(['*', '?'])
    }

    pub fn is_property_value_pattern(&self) -> bool {
        self.properties.iter().any(|(_, v)| value_has_wildcard(v))
    }

    pub fn is_pattern(&self) -> bool {
        self.property_list_pattern || self.is_domain_pattern() || self.is_property_value_pattern()
    }

    /// Domain followed by the properties sorted by key
    pub fn canonical_name(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.properties.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut props: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        if self.property_list_pattern {
            props.push("*".to_string());
        }
        format!("{}:{}", self.domain, props.join(","))
    }

    /// Whether `name` matches `self` read as a pattern
    pub fn matches(&self, name: &ExternalName) -> bool {
        if !glob_match(&self.domain, &name.domain) {
            return false;
        }
        if !self.property_list_pattern && self.properties.len() != name.properties.len() {
            return false;
        }
        self.properties.iter().all(|(key, pattern)| match name.property(key) {
            Some(value) => value_matches(pattern, value),
            None => false,
        })
    }

    /// Whether `domain` matches this name's domain read as a glob
    pub fn matches_domain(&self, domain: &str) -> bool {
        glob_match(&self.domain, domain)
    }

    /// Whether a single `key=value` property is compatible with this pattern
    ///
    /// A key the pattern does not name is compatible only with a property-list pattern.
    pub fn admits_property(&self, key: &str, value: &str) -> bool {
        match self.property(key) {
            Some(pattern) => value_matches(pattern, value),
            None => self.property_list_pattern,
        }
    }

    // ===== PRIVATE HELPER METHODS =====

    fn validate(&self) -> Result<()> {
        let text = self.to_string();
        if self.properties.is_empty() && !self.property_list_pattern {
            return Err(malformed(&text, "no key properties"));
        }
        for (i, (key, value)) in self.properties.iter().enumerate() {
            if key.is_empty() || key.contains(KEY_FORBIDDEN) {
                return Err(malformed(&text, "invalid key"));
            }
            validate_value(value).map_err(|m| malformed(&text, m))?;
            if self.properties[..i].iter().any(|(k, _)| k == key) {
                return Err(malformed(&text, "duplicate key"));
            }
        }
        Ok(())
    }
}

fn malformed(text: &str, reason: &str) -> BridgeError {
    BridgeError::MalformedName(format!("{} ({})", text, reason))
}

/// Split on commas that are not inside a quoted value
fn split_properties(text: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted value");
    }
    parts.push(&text[start..]);
    if parts.iter().any(|p| p.is_empty()) {
        return Err("empty property");
    }
    Ok(parts)
}

fn validate_value(value: &str) -> std::result::Result<(), &'static str> {
    if value.starts_with('"') {
        let inner = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .filter(|_| value.len() >= 2)
            .ok_or("unterminated quoted value")?;
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('\\' | '"' | '*' | '?' | 'n') => {}
                    _ => return Err("invalid escape in quoted value"),
                },
                '"' | '\n' => return Err("unescaped character in quoted value"),
                _ => {}
            }
        }
        Ok(())
    } else if value.is_empty() {
        Err("empty value")
    } else if value.contains(UNQUOTED_VALUE_FORBIDDEN) {
        Err("invalid character in unquoted value")
    } else {
        Ok(())
    }
}

fn value_has_wildcard(value: &str) -> bool {
    if !value.starts_with('"') {
        return value.contains(['*', '?']);
    }
    let mut escaped = false;
    for c in value.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

fn value_matches(pattern: &str, value: &str) -> bool {
    if value_has_wildcard(pattern) {
        glob_match(pattern, value)
    } else {
        pattern == value
    }
}

/// Glob match with `*` and `?`; a backslash makes the next pattern character literal
fn glob_match(pattern: &str, text: &str) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Token {
        Literal(char),
        Any,
        One,
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '*' => Token::Any,
            '?' => Token::One,
            '\\' => match chars.next() {
                Some(next) => {
                    // Keep escapes literal on both sides of the comparison
                    tokens.push(Token::Literal('\\'));
                    Token::Literal(next)
                }
                None => Token::Literal('\\'),
            },
            other => Token::Literal(other),
        };
        tokens.push(token);
    }

    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp + 1;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|t| *t == Token::Any)
}

impl fmt::Display for ExternalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (key, value) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        if self.property_list_pattern {
            if !first {
                f.write_str(",")?;
            }
            f.write_str("*")?;
        }
        Ok(())
    }
}

impl FromStr for ExternalName {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for ExternalName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_name() == other.canonical_name()
    }
}

impl Eq for ExternalName {}

impl Hash for ExternalName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_name().hash(state);
    }
}

impl PartialOrd for ExternalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExternalName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_name().cmp(&other.canonical_name())
    }
}
