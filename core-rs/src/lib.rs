//! # Model Bridge
//!
//! Exposes a hierarchical management resource tree through a flat-name
//! introspection protocol. External callers see each resource as an entity
//! named `domain:key=value,key=value` with typed attributes and operations.
//! The bridge translates their calls into generic requests for the
//! management kernel, which owns the tree.
//!
//! ## Key Features
//!
//! - Reversible path <-> name encoding guided by the live tree
//! - Two conversion domains over one kernel: eager expression resolution and expression-aware
//! - Descriptors synthesized from metadata on every call, child creation operations included
//! - Access decisions gate traversal, reads, writes and operations
//! - Kernel notifications reissued as external events with per-domain sequence numbers
//!
//! ## Architecture
//!
//! ```text
//!   external caller
//!         │  get / set / invoke / query / describe / listeners
//!   ┌─────▼──────────────────────────────────────────────┐
//!   │ ManagementBridge (per-domain routing, audit)       │
//!   │   ModelBridge ── AddressCodec, TypeConverters      │
//!   │   NotificationBridge ── SequenceCounter            │
//!   └─────┬──────────────────────────────────────────────┘
//!         │  GenericRequest / Notification
//!   ┌─────▼──────────────────────────────────────────────┐
//!   │ ManagementKernel + ResourceTree + MetadataProvider │
//!   │ + AccessControl (InMemoryKernel in tests and CLI)  │
//!   └────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod bridge;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod errors;
pub mod kernel;
pub mod model;
pub mod naming;
pub mod rbac;
pub mod walker;

pub use audit::{AuditEntry, BridgeAuditLogger};
pub use bridge::{
    ExternalNotification, ManagementBridge, ModelBridge, NotificationBridge, NotificationKind,
    NotificationListener, OperationTarget, SequenceCounter,
};
pub use config::{AuditConfig, BridgeConfig, BridgePolicy};
pub use convert::{OpenType, OpenValue, TypeConverters};
pub use descriptor::{DescriptorBuilder, EntityDescriptor};
pub use errors::{BridgeError, Result};
pub use kernel::{GenericRequest, GenericResult, InMemoryKernel, KernelHandle, ManagementKernel, ModelSnapshot};
pub use model::{MetadataDocument, PathElement, ResourcePath, Value, ValueKind};
pub use naming::{AddressCodec, ExternalName};
pub use rbac::{AccessControl, AccessDecision, AccessPolicy, AccessRule, PermissionChecker};
pub use walker::{ResourceVisitor, ResourceWalker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
