//! In-process management kernel
//!
//! Holds a resource tree, the metadata registrations that describe it, an
//! access policy and a notification registry. Standard operations are
//! executed directly; anything else goes to a handler registered with
//! [`InMemoryKernel::register_operation`].

use crate::errors::{BridgeError, Result};
use crate::kernel::protocol::{
    AddressPattern, GenericRequest, GenericResult, HandlerId, Notification, NotificationFilter,
    NotificationHandler, RESOURCE_ADDED_NOTIFICATION, RESOURCE_REMOVED_NOTIFICATION,
};
use crate::kernel::snapshot::ModelSnapshot;
use crate::kernel::{ManagementKernel, MetadataProvider, ResourceTree};
use crate::model::metadata::{
    ADD, READ_ATTRIBUTE, READ_RESOURCE, READ_RESOURCE_DESCRIPTION, REMOVE, WRITE_ATTRIBUTE,
};
use crate::model::{MetadataDocument, ResourcePath, Value};
use crate::rbac::{AccessControl, AccessDecision, AccessPolicy, PermissionChecker};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Handler for a non-standard operation
pub type OperationHandler = Arc<dyn Fn(&GenericRequest) -> GenericResult + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct ResourceNode {
    attributes: IndexMap<String, Value>,
}

struct HandlerEntry {
    pattern: AddressPattern,
    handler: Arc<dyn NotificationHandler>,
    filter: NotificationFilter,
}

/// Management kernel backed by in-process maps
pub struct InMemoryKernel {
    /// Resource nodes keyed by path; the root always exists
    nodes: RwLock<BTreeMap<ResourcePath, ResourceNode>>,

    /// Metadata registrations keyed by path pattern
    registrations: RwLock<Vec<(ResourcePath, Arc<MetadataDocument>)>>,

    operations: RwLock<BTreeMap<String, OperationHandler>>,

    handlers: RwLock<IndexMap<HandlerId, HandlerEntry>>,

    checker: RwLock<Arc<PermissionChecker>>,
}

impl InMemoryKernel {
    /// Empty tree holding only the root resource
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ResourcePath::root(), ResourceNode::default());
        Self {
            nodes: RwLock::new(nodes),
            registrations: RwLock::new(Vec::new()),
            operations: RwLock::new(BTreeMap::new()),
            handlers: RwLock::new(IndexMap::new()),
            checker: RwLock::new(Arc::new(PermissionChecker::new(AccessPolicy::allow_all()))),
        }
    }

    /// Build a kernel from a model snapshot
    ///
    /// # Errors
    /// `Config` when a resource is listed before its parent
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self> {
        let kernel = Self::new();
        for registration in snapshot.registrations {
            kernel.register(registration.path, registration.metadata);
        }
        for resource in snapshot.resources {
            kernel.insert_resource(resource.path, resource.attributes)?;
        }
        kernel.set_access_policy(snapshot.access);
        info!(
            resources = kernel.nodes.read().len(),
            registrations = kernel.registrations.read().len(),
            "loaded model snapshot"
        );
        Ok(kernel)
    }

    /// Register the metadata for resources matching `pattern`
    pub fn register(&self, pattern: ResourcePath, metadata: MetadataDocument) {
        let mut registrations = self.registrations.write();
        registrations.retain(|(existing, _)| existing != &pattern);
        registrations.push((pattern, Arc::new(metadata)));
    }

    /// Insert a resource without emitting notifications
    ///
    /// # Errors
    /// `Config` when the parent does not exist
    pub fn insert_resource(&self, path: ResourcePath, attributes: IndexMap<String, Value>) -> Result<()> {
        let mut nodes = self.nodes.write();
        if let Some(parent) = path.parent() {
            if !nodes.contains_key(&parent) {
                return Err(BridgeError::Config(format!(
                    "Cannot insert {}: parent {} does not exist",
                    path, parent
                )));
            }
        }
        nodes.insert(path, ResourceNode { attributes });
        Ok(())
    }

    /// Install the handler for a non-standard operation name
    pub fn register_operation(&self, name: impl Into<String>, handler: OperationHandler) {
        self.operations.write().insert(name.into(), handler);
    }

    pub fn set_access_policy(&self, policy: AccessPolicy) {
        *self.checker.write() = Arc::new(PermissionChecker::new(policy));
    }

    /// Current value of an attribute, bypassing the request protocol
    pub fn attribute(&self, path: &ResourcePath, name: &str) -> Option<Value> {
        self.nodes.read().get(path).and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn resource_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    // ===== PRIVATE HELPER METHODS =====

    fn dispatch(&self, request: &GenericRequest) -> std::result::Result<(Value, Vec<Notification>), String> {
        match request.operation.as_str() {
            READ_ATTRIBUTE => self.read_attribute(request).map(|v| (v, Vec::new())),
            WRITE_ATTRIBUTE => self.write_attribute(request),
            ADD => self.add_resource(request),
            REMOVE => self.remove_resource(request),
            READ_RESOURCE => self.read_resource(request).map(|v| (v, Vec::new())),
            READ_RESOURCE_DESCRIPTION => self.read_description(request).map(|v| (v, Vec::new())),
            _ => self.custom_operation(request),
        }
    }

    fn require_resource(&self, address: &ResourcePath) -> std::result::Result<(), String> {
        if self.nodes.read().contains_key(address) {
            Ok(())
        } else {
            Err(format!("Resource {} does not exist", address))
        }
    }

    fn name_parameter<'a>(&self, request: &'a GenericRequest) -> std::result::Result<&'a str, String> {
        request
            .parameter("name")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Operation {} requires a 'name' parameter", request.operation))
    }

    fn read_attribute(&self, request: &GenericRequest) -> std::result::Result<Value, String> {
        self.require_resource(&request.address)?;
        let name = self.name_parameter(request)?;
        if let Some(metadata) = self.describe(&request.address) {
            if metadata.attribute(name).is_none() {
                return Err(format!("Unknown attribute {} at {}", name, request.address));
            }
        }
        Ok(self.attribute(&request.address, name).unwrap_or_default())
    }

    fn write_attribute(
        &self,
        request: &GenericRequest,
    ) -> std::result::Result<(Value, Vec<Notification>), String> {
        let name = self.name_parameter(request)?.to_string();
        if let Some(metadata) = self.describe(&request.address) {
            match metadata.attribute(&name) {
                Some(attribute) if attribute.is_writable() => {}
                Some(_) => return Err(format!("Attribute {} is read-only", name)),
                None => return Err(format!("Unknown attribute {} at {}", name, request.address)),
            }
        }
        let value = request.parameter("value").cloned().unwrap_or_default();

        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(&request.address)
            .ok_or_else(|| format!("Resource {} does not exist", request.address))?;
        let old = node
            .attributes
            .insert(name.clone(), value.clone())
            .unwrap_or_default();
        drop(nodes);

        let notification = Notification::attribute_written(request.address.clone(), &name, old, value);
        Ok((Value::Undefined, vec![notification]))
    }

    fn add_resource(
        &self,
        request: &GenericRequest,
    ) -> std::result::Result<(Value, Vec<Notification>), String> {
        let address = &request.address;
        let parent = address
            .parent()
            .ok_or_else(|| "The root resource cannot be added".to_string())?;
        if self.describe(address).is_none() {
            return Err(format!("No resource type is registered at {}", address));
        }

        let mut nodes = self.nodes.write();
        if !nodes.contains_key(&parent) {
            return Err(format!("Parent {} does not exist", parent));
        }
        if nodes.contains_key(address) {
            return Err(format!("Duplicate resource {}", address));
        }
        nodes.insert(
            address.clone(),
            ResourceNode {
                attributes: request.parameters.clone(),
            },
        );
        drop(nodes);

        let notification = Notification::new(
            RESOURCE_ADDED_NOTIFICATION,
            address.clone(),
            format!("resource {} was added", address),
            Value::Undefined,
        );
        Ok((Value::Undefined, vec![notification]))
    }

    fn remove_resource(
        &self,
        request: &GenericRequest,
    ) -> std::result::Result<(Value, Vec<Notification>), String> {
        let address = &request.address;
        if address.is_empty() {
            return Err("The root resource cannot be removed".to_string());
        }

        let mut nodes = self.nodes.write();
        if !nodes.contains_key(address) {
            return Err(format!("Resource {} does not exist", address));
        }
        let mut removed: Vec<ResourcePath> = nodes
            .keys()
            .filter(|p| *p == address || address.is_ancestor_of(p))
            .cloned()
            .collect();
        for path in &removed {
            nodes.remove(path);
        }
        drop(nodes);

        // Deepest resources first
        removed.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let notifications = removed
            .into_iter()
            .map(|path| {
                let message = format!("resource {} was removed", path);
                Notification::new(RESOURCE_REMOVED_NOTIFICATION, path, message, Value::Undefined)
            })
            .collect();
        Ok((Value::Undefined, notifications))
    }

    fn read_resource(&self, request: &GenericRequest) -> std::result::Result<Value, String> {
        let nodes = self.nodes.read();
        let node = nodes
            .get(&request.address)
            .ok_or_else(|| format!("Resource {} does not exist", request.address))?;
        Ok(Value::Object(node.attributes.clone()))
    }

    fn read_description(&self, request: &GenericRequest) -> std::result::Result<Value, String> {
        let metadata = self
            .describe(&request.address)
            .ok_or_else(|| format!("No resource type is registered at {}", request.address))?;
        let json = serde_json::to_value(metadata.as_ref()).map_err(|e| e.to_string())?;
        Value::from_json(&json).map_err(|e| e.to_string())
    }

    fn custom_operation(
        &self,
        request: &GenericRequest,
    ) -> std::result::Result<(Value, Vec<Notification>), String> {
        self.require_resource(&request.address)?;
        let handler = self.operations.read().get(&request.operation).cloned();
        let Some(handler) = handler else {
            return Err(format!(
                "Operation {} is not supported at {}",
                request.operation, request.address
            ));
        };

        let result = handler(request);
        if result.is_success() {
            Ok((result.result, Vec::new()))
        } else {
            Err(result
                .failure_description
                .unwrap_or_else(|| format!("Operation {} failed", request.operation)))
        }
    }

    fn deliver(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let targets: Vec<Arc<dyn NotificationHandler>> = self
                .handlers
                .read()
                .values()
                .filter(|e| e.pattern.matches(&notification.source) && (e.filter)(&notification))
                .map(|e| e.handler.clone())
                .collect();
            // Handlers run without any kernel lock held
            for handler in targets {
                handler.handle_notification(&notification);
            }
        }
    }
}

impl Default for InMemoryKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementKernel for InMemoryKernel {
    fn execute(&self, request: GenericRequest) -> GenericResult {
        debug!(operation = %request.operation, address = %request.address, "executing request");
        match self.dispatch(&request) {
            Ok((result, notifications)) => {
                self.deliver(notifications);
                GenericResult::success(result)
            }
            Err(description) => {
                debug!(operation = %request.operation, error = %description, "request failed");
                GenericResult::failed(description)
            }
        }
    }

    fn register_handler(
        &self,
        pattern: AddressPattern,
        handler: Arc<dyn NotificationHandler>,
        filter: NotificationFilter,
    ) -> HandlerId {
        let id = HandlerId::new();
        self.handlers.write().insert(id, HandlerEntry { pattern, handler, filter });
        id
    }

    fn unregister_handler(&self, id: HandlerId) -> bool {
        self.handlers.write().shift_remove(&id).is_some()
    }
}

impl ResourceTree for InMemoryKernel {
    fn has_resource(&self, path: &ResourcePath) -> bool {
        self.nodes.read().contains_key(path)
    }

    fn child_types(&self, path: &ResourcePath) -> Vec<String> {
        let nodes = self.nodes.read();
        let types: BTreeSet<String> = nodes
            .keys()
            .filter(|p| p.len() == path.len() + 1 && path.is_ancestor_of(p))
            .filter_map(|p| p.last().map(|e| e.key.clone()))
            .collect();
        types.into_iter().collect()
    }

    fn child_names(&self, path: &ResourcePath, child_type: &str) -> Vec<String> {
        let nodes = self.nodes.read();
        nodes
            .keys()
            .filter(|p| p.len() == path.len() + 1 && path.is_ancestor_of(p))
            .filter_map(|p| p.last())
            .filter(|e| e.key == child_type)
            .map(|e| e.value.clone())
            .collect()
    }
}

impl MetadataProvider for InMemoryKernel {
    fn describe(&self, path: &ResourcePath) -> Option<Arc<MetadataDocument>> {
        self.registrations
            .read()
            .iter()
            .filter(|(pattern, _)| pattern.matches(path))
            .min_by_key(|(pattern, _)| pattern.wildcard_count())
            .map(|(_, metadata)| metadata.clone())
    }
}

impl AccessControl for InMemoryKernel {
    fn decide(&self, path: &ResourcePath, include_operations: bool) -> AccessDecision {
        let checker = self.checker.read().clone();
        let metadata = self.describe(path);
        checker.decide(path, metadata.as_deref(), include_operations)
    }
}
