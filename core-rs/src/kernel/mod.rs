//! Management kernel collaborators
//!
//! The bridge never owns the resource tree. It reads it through the traits in
//! this module and sends every mutation to the kernel as a generic request:
//!
//! - [`ManagementKernel`] executes generic requests and hosts the notification registry
//! - [`ResourceTree`] answers existence and child enumeration questions
//! - [`MetadataProvider`] supplies the metadata document of a resource
//! - [`AccessControl`](crate::rbac::AccessControl) decides what a caller may see and do
//!
//! [`InMemoryKernel`] implements all four and backs the tests and the CLI.

pub mod memory;
pub mod protocol;
pub mod snapshot;

pub use memory::InMemoryKernel;
pub use protocol::{
    accept_all, AddressPattern, GenericRequest, GenericResult, HandlerId, Notification,
    NotificationFilter, NotificationHandler, Outcome, ACCESS_MECHANISM_HEADER,
    ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION, RESOURCE_ADDED_NOTIFICATION, RESOURCE_REMOVED_NOTIFICATION,
};
pub use snapshot::{ModelSnapshot, RegistrationSnapshot, ResourceSnapshot};

use crate::model::{MetadataDocument, ResourcePath};
use crate::rbac::AccessControl;
use std::sync::Arc;

/// Executes generic requests and delivers notifications
pub trait ManagementKernel: Send + Sync {
    /// Execute a request; blocks until the kernel has a result
    fn execute(&self, request: GenericRequest) -> GenericResult;

    fn register_handler(
        &self,
        pattern: AddressPattern,
        handler: Arc<dyn NotificationHandler>,
        filter: NotificationFilter,
    ) -> HandlerId;

    /// Returns false when no handler was registered under `id`
    fn unregister_handler(&self, id: HandlerId) -> bool;
}

/// Read-only view of the resource tree
pub trait ResourceTree: Send + Sync {
    fn has_resource(&self, path: &ResourcePath) -> bool;

    /// Child type keys present beneath `path`, in a stable order
    fn child_types(&self, path: &ResourcePath) -> Vec<String>;

    /// Instance values of `child_type` beneath `path`, in a stable order
    fn child_names(&self, path: &ResourcePath, child_type: &str) -> Vec<String>;
}

/// Resolves the metadata document of the resource type at a path
pub trait MetadataProvider: Send + Sync {
    fn describe(&self, path: &ResourcePath) -> Option<Arc<MetadataDocument>>;
}

/// Bundle of collaborator handles shared by every bridge component
#[derive(Clone)]
pub struct KernelHandle {
    pub kernel: Arc<dyn ManagementKernel>,
    pub tree: Arc<dyn ResourceTree>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub access: Arc<dyn AccessControl>,
}

impl KernelHandle {
    pub fn new(
        kernel: Arc<dyn ManagementKernel>,
        tree: Arc<dyn ResourceTree>,
        metadata: Arc<dyn MetadataProvider>,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            kernel,
            tree,
            metadata,
            access,
        }
    }

    /// Use one object for every collaborator role
    pub fn from_shared<K>(kernel: Arc<K>) -> Self
    where
        K: ManagementKernel + ResourceTree + MetadataProvider + AccessControl + 'static,
    {
        Self {
            kernel: kernel.clone(),
            tree: kernel.clone(),
            metadata: kernel.clone(),
            access: kernel,
        }
    }
}
