//! The bridge proper
//!
//! - [`resolution`]: ordered external to internal name lookups
//! - [`dispatcher`]: [`ModelBridge`], get/set/invoke/query/describe for one domain
//! - [`notification`]: [`NotificationBridge`], kernel to external notification translation
//! - [`server`]: [`ManagementBridge`], the multi-domain facade

pub mod dispatcher;
pub mod notification;
pub mod resolution;
pub mod server;

pub use dispatcher::{ModelBridge, ACCESS_MECHANISM};
pub use notification::{
    ExternalNotification, NotificationBridge, NotificationKind, NotificationListener, SequenceCounter,
    ATTRIBUTE_CHANGE_NOTIFICATION, REGISTRATION_NOTIFICATION, UNREGISTRATION_NOTIFICATION,
};
pub use resolution::{resolve_attribute, resolve_operation, OperationTarget, OPERATION_STRATEGIES};
pub use server::{DomainBridge, ManagementBridge};
