//! Generic request/response and notification protocol of the management kernel

use crate::model::{ResourcePath, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Emitted after a resource was created
pub const RESOURCE_ADDED_NOTIFICATION: &str = "resource-added";
/// Emitted after a resource was removed
pub const RESOURCE_REMOVED_NOTIFICATION: &str = "resource-removed";
/// Emitted after an attribute was written; data is `{name, old-value, new-value}`
pub const ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION: &str = "attribute-value-written";

/// Header identifying the channel a request came through
pub const ACCESS_MECHANISM_HEADER: &str = "access-mechanism";

/// Operation request addressed at a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRequest {
    pub operation: String,
    pub address: ResourcePath,
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl GenericRequest {
    pub fn new(operation: impl Into<String>, address: ResourcePath) -> Self {
        Self {
            operation: operation.into(),
            address,
            parameters: IndexMap::new(),
            headers: IndexMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Result of executing a [`GenericRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GenericResult {
    pub outcome: Outcome,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_description: Option<String>,
}

impl GenericResult {
    pub fn success(result: Value) -> Self {
        Self {
            outcome: Outcome::Success,
            result,
            failure_description: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: Value::Undefined,
            failure_description: Some(description.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Kernel-defined notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub source: ResourcePath,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

impl Notification {
    pub fn new(
        notification_type: impl Into<String>,
        source: ResourcePath,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            source,
            message: message.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Attribute change notification with `{name, old-value, new-value}` data
    pub fn attribute_written(source: ResourcePath, name: &str, old: Value, new: Value) -> Self {
        let message = format!("attribute {} at {} was written", name, source);
        let data = Value::object([
            ("name", Value::string(name)),
            ("old-value", old),
            ("new-value", new),
        ]);
        Self::new(ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION, source, message, data)
    }

    pub fn is_lifecycle(&self) -> bool {
        self.notification_type == RESOURCE_ADDED_NOTIFICATION
            || self.notification_type == RESOURCE_REMOVED_NOTIFICATION
    }
}

/// Receiver of kernel notifications; called on kernel-owned delivery threads
pub trait NotificationHandler: Send + Sync {
    fn handle_notification(&self, notification: &Notification);
}

/// Predicate deciding whether a handler sees a notification
pub type NotificationFilter = Arc<dyn Fn(&Notification) -> bool + Send + Sync>;

/// Filter that accepts every notification
pub fn accept_all() -> NotificationFilter {
    Arc::new(|_| true)
}

/// Which sources a handler is registered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPattern {
    /// A single path; wildcard element values match any instance
    Path(ResourcePath),
    /// Every resource in the tree
    Any,
}

impl AddressPattern {
    pub fn matches(&self, source: &ResourcePath) -> bool {
        match self {
            AddressPattern::Path(pattern) => pattern.matches(source),
            AddressPattern::Any => true,
        }
    }
}

/// Token returned by handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
