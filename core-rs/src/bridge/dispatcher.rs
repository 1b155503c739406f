//! Per-domain request dispatcher
//!
//! [`ModelBridge`] serves one external domain. Every call re-resolves the
//! name against the current tree, asks for a fresh access decision and reads
//! fresh metadata; nothing is cached between calls. Address and access
//! failures are detected before anything is sent to the kernel.

use crate::bridge::resolution::{resolve_attribute, resolve_operation, OperationTarget};
use crate::config::BridgePolicy;
use crate::convert::{OpenValue, TypeConverters};
use crate::descriptor::{ChildAddOperation, DescriptorBuilder, EntityDescriptor};
use crate::errors::{BridgeError, Result};
use crate::kernel::{GenericRequest, GenericResult, KernelHandle, ACCESS_MECHANISM_HEADER};
use crate::model::metadata::{ADD, READ_ATTRIBUTE, WRITE_ATTRIBUTE};
use crate::model::{
    AttributeDefinition, MetadataDocument, OperationDefinition, ParameterDefinition, PathElement,
    ResourcePath, Value,
};
use crate::naming::{AddressCodec, ExternalName};
use crate::rbac::AccessDecision;
use crate::walker::{ResourceVisitor, ResourceWalker};
use std::sync::Arc;
use tracing::debug;

/// Value of the access-mechanism header on every request the bridge sends
pub const ACCESS_MECHANISM: &str = "EXTERNAL";

/// Dispatcher for one external domain
pub struct ModelBridge {
    codec: AddressCodec,
    converters: TypeConverters,
    policy: BridgePolicy,
    excluded: Vec<ResourcePath>,
    handle: KernelHandle,
}

impl ModelBridge {
    pub fn new(
        domain: impl Into<String>,
        converters: TypeConverters,
        policy: BridgePolicy,
        excluded: Vec<ResourcePath>,
        handle: KernelHandle,
    ) -> Self {
        Self {
            codec: AddressCodec::new(domain),
            converters,
            policy,
            excluded,
            handle,
        }
    }

    pub fn domain(&self) -> &str {
        self.codec.domain()
    }

    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    pub fn converters(&self) -> &TypeConverters {
        &self.converters
    }

    pub fn policy(&self) -> BridgePolicy {
        self.policy
    }

    pub fn handle(&self) -> &KernelHandle {
        &self.handle
    }

    /// Whether a name (or pattern) addresses this domain
    pub fn accepts(&self, name: &ExternalName) -> bool {
        if name.is_domain_pattern() {
            name.matches_domain(self.domain())
        } else {
            name.domain() == self.domain()
        }
    }

    /// Whether `path` lies in an excluded subtree
    pub fn is_excluded(&self, path: &ResourcePath) -> bool {
        is_excluded(&self.excluded, path)
    }

    /// Resource path of an existing, non-excluded resource
    ///
    /// # Errors
    /// `AddressNotResolvable` when no resource has this name
    pub fn resolve_path(&self, name: &ExternalName) -> Result<ResourcePath> {
        self.codec
            .decode(name, self.handle.tree.as_ref())
            .filter(|path| !self.is_excluded(path))
            .ok_or_else(|| BridgeError::AddressNotResolvable(name.to_string()))
    }

    /// Whether the name resolves to a resource the caller may address
    pub fn is_registered(&self, name: &ExternalName) -> bool {
        self.resolve_addressable(name, false).is_ok()
    }

    /// Number of addressable resources, root included
    pub fn resource_count(&self) -> usize {
        let counter = ResourceCounter {
            excluded: &self.excluded,
            count: 0,
        };
        self.walker().walk(&ResourcePath::root(), counter)
    }

    /// Names of addressable resources matching `pattern` (every name when `None`)
    pub fn query_names(&self, pattern: Option<&ExternalName>) -> Vec<ExternalName> {
        if let Some(pattern) = pattern {
            if !pattern.matches_domain(self.domain()) {
                return Vec::new();
            }
        }
        let visitor = QueryVisitor {
            codec: &self.codec,
            pattern,
            excluded: &self.excluded,
            names: Vec::new(),
        };
        let names = self.walker().walk(&ResourcePath::root(), visitor);
        debug!(domain = self.domain(), pattern = ?pattern.map(|p| p.to_string()), count = names.len(), "Queried names");
        names
    }

    /// Describe the resource behind `name`
    pub fn describe(&self, name: &ExternalName) -> Result<EntityDescriptor> {
        let (path, decision) = self.resolve_addressable(name, true)?;
        let metadata = self.metadata(&path)?;
        Ok(DescriptorBuilder::new(&self.converters, self.policy).build(&path, &metadata, &decision))
    }

    /// Read one attribute
    ///
    /// # Arguments
    /// * `name` - External name of the resource
    /// * `attribute` - Attribute name, internal or camelCase
    pub fn get_attribute(&self, name: &ExternalName, attribute: &str) -> Result<OpenValue> {
        let (path, decision) = self.resolve_addressable(name, false)?;
        let metadata = self.metadata(&path)?;
        let definition = find_attribute(name, attribute, &metadata)?;
        self.read(&path, &decision, definition)
    }

    /// Read several attributes; the first failure aborts the call
    pub fn get_attributes(&self, name: &ExternalName, attributes: &[&str]) -> Result<Vec<(String, OpenValue)>> {
        let (path, decision) = self.resolve_addressable(name, false)?;
        let metadata = self.metadata(&path)?;
        attributes
            .iter()
            .map(|attribute| {
                let definition = find_attribute(name, attribute, &metadata)?;
                Ok((attribute.to_string(), self.read(&path, &decision, definition)?))
            })
            .collect()
    }

    /// Write one attribute
    pub fn set_attribute(&self, name: &ExternalName, attribute: &str, value: &OpenValue) -> Result<()> {
        let (path, decision) = self.resolve_addressable(name, false)?;
        let metadata = self.metadata(&path)?;
        let definition = find_attribute(name, attribute, &metadata)?;
        self.write(&path, &decision, definition, value)
    }

    /// Write several attributes in order; the first failure aborts the call
    pub fn set_attributes(&self, name: &ExternalName, values: &[(String, OpenValue)]) -> Result<()> {
        let (path, decision) = self.resolve_addressable(name, false)?;
        let metadata = self.metadata(&path)?;
        for (attribute, value) in values {
            let definition = find_attribute(name, attribute, &metadata)?;
            self.write(&path, &decision, definition, value)?;
        }
        Ok(())
    }

    /// Invoke an operation; returns `None` when the operation declares no reply
    ///
    /// # Arguments
    /// * `name` - External name of the resource
    /// * `operation` - Operation name, internal or camelCase, or a synthesized `add<Child>` name
    /// * `params` - Parameters in declared order
    pub fn invoke(&self, name: &ExternalName, operation: &str, params: &[OpenValue]) -> Result<Option<OpenValue>> {
        let (path, decision) = self.resolve_addressable(name, true)?;
        let metadata = self.metadata(&path)?;

        match resolve_operation(operation, &metadata) {
            Some(OperationTarget::Declared(definition)) => {
                if !self.policy.writable && !definition.read_only {
                    return Err(operation_not_found(name, operation));
                }
                if self.policy.enforce_access_control && !decision.can_execute(&definition.name) {
                    return Err(BridgeError::NotAuthorized(format!(
                        "Operation {} on {}",
                        definition.name, name
                    )));
                }
                self.execute_operation(&path, definition, params)
            }
            Some(OperationTarget::ChildAdd(child_add)) => {
                if !self.policy.writable {
                    return Err(operation_not_found(name, operation));
                }
                self.execute_child_add(name, &path, &child_add, params)
            }
            None => Err(operation_not_found(name, operation)),
        }
    }

    // ===== PRIVATE HELPER METHODS =====

    fn walker(&self) -> ResourceWalker<'_> {
        ResourceWalker::new(self.handle.tree.as_ref(), self.handle.access.as_ref())
    }

    fn resolve_addressable(&self, name: &ExternalName, include_operations: bool) -> Result<(ResourcePath, AccessDecision)> {
        let path = self.resolve_path(name)?;
        let decision = self.handle.access.decide(&path, include_operations);
        if !decision.addressable {
            return Err(BridgeError::NotAddressable(name.to_string()));
        }
        Ok((path, decision))
    }

    fn metadata(&self, path: &ResourcePath) -> Result<Arc<MetadataDocument>> {
        self.handle
            .metadata
            .describe(path)
            .ok_or_else(|| BridgeError::RegistrationNotFound(path.to_string()))
    }

    fn read(&self, path: &ResourcePath, decision: &AccessDecision, definition: &AttributeDefinition) -> Result<OpenValue> {
        if self.policy.enforce_access_control && !decision.can_read(&definition.name) {
            return Err(BridgeError::NotAuthorized(format!(
                "Read of {} at {}",
                definition.name, path
            )));
        }
        let request = self
            .request(READ_ATTRIBUTE, path.clone())
            .with_parameter("name", Value::string(definition.name.clone()));
        let result = self.execute(request)?;
        self.converters.encode(&definition.type_descriptor, &result.result)
    }

    fn write(
        &self,
        path: &ResourcePath,
        decision: &AccessDecision,
        definition: &AttributeDefinition,
        value: &OpenValue,
    ) -> Result<()> {
        if !self.policy.writable || !definition.is_writable() {
            return Err(BridgeError::AttributeNotWritable(format!(
                "{} at {}",
                definition.name, path
            )));
        }
        if self.policy.enforce_access_control && !decision.can_write(&definition.name) {
            return Err(BridgeError::NotAuthorized(format!(
                "Write of {} at {}",
                definition.name, path
            )));
        }
        let value = self.converters.decode(&definition.type_descriptor, value)?;
        let request = self
            .request(WRITE_ATTRIBUTE, path.clone())
            .with_parameter("name", Value::string(definition.name.clone()))
            .with_parameter("value", value);
        self.execute(request)?;
        Ok(())
    }

    fn execute_operation(
        &self,
        path: &ResourcePath,
        definition: &OperationDefinition,
        params: &[OpenValue],
    ) -> Result<Option<OpenValue>> {
        let request = self.with_parameters(
            self.request(&definition.name, path.clone()),
            &definition.parameters,
            params,
        )?;
        let result = self.execute(request)?;
        self.encode_reply(definition, &result)
    }

    fn execute_child_add(
        &self,
        name: &ExternalName,
        path: &ResourcePath,
        child_add: &ChildAddOperation<'_>,
        params: &[OpenValue],
    ) -> Result<Option<OpenValue>> {
        let (child, params) = if child_add.takes_name_parameter() {
            let (first, rest) = params.split_first().ok_or(BridgeError::ParameterCountMismatch {
                expected: child_add.operation.parameters.len() + 1,
                actual: 0,
            })?;
            let child_name = first.as_str().ok_or_else(|| {
                BridgeError::TypeConversion(format!(
                    "Name of the new {} must be a string, got {}",
                    child_add.element.key,
                    first.kind_name()
                ))
            })?;
            (PathElement::new(child_add.element.key.clone(), child_name), rest)
        } else {
            (child_add.element.clone(), params)
        };

        let child_path = path.append(child);
        if self.policy.enforce_access_control && !self.handle.access.decide(&child_path, true).can_execute(ADD) {
            return Err(BridgeError::NotAuthorized(format!(
                "Operation {} on {}",
                child_add.external_name, name
            )));
        }

        debug!(domain = self.domain(), path = %child_path, "Adding child resource");
        let request = self.with_parameters(
            self.request(ADD, child_path),
            &child_add.operation.parameters,
            params,
        )?;
        let result = self.execute(request)?;
        self.encode_reply(child_add.operation, &result)
    }

    fn request(&self, operation: &str, path: ResourcePath) -> GenericRequest {
        GenericRequest::new(operation, path).with_header(ACCESS_MECHANISM_HEADER, ACCESS_MECHANISM)
    }

    fn with_parameters(
        &self,
        mut request: GenericRequest,
        declared: &[ParameterDefinition],
        params: &[OpenValue],
    ) -> Result<GenericRequest> {
        if declared.len() != params.len() {
            return Err(BridgeError::ParameterCountMismatch {
                expected: declared.len(),
                actual: params.len(),
            });
        }
        for (definition, param) in declared.iter().zip(params) {
            let value = self.converters.decode(&definition.type_descriptor, param)?;
            if value.is_defined() {
                request = request.with_parameter(definition.name.clone(), value);
            }
        }
        Ok(request)
    }

    fn execute(&self, request: GenericRequest) -> Result<GenericResult> {
        debug!(operation = %request.operation, address = %request.address, "Dispatching request");
        let result = self.handle.kernel.execute(request);
        if result.is_success() {
            Ok(result)
        } else {
            Err(BridgeError::KernelExecutionFailure(
                result.failure_description.unwrap_or_default(),
            ))
        }
    }

    fn encode_reply(&self, definition: &OperationDefinition, result: &GenericResult) -> Result<Option<OpenValue>> {
        match &definition.reply {
            Some(reply) => self.converters.encode(reply, &result.result).map(Some),
            None => Ok(None),
        }
    }
}

fn find_attribute<'a>(
    name: &ExternalName,
    attribute: &str,
    metadata: &'a MetadataDocument,
) -> Result<&'a AttributeDefinition> {
    resolve_attribute(attribute, metadata)
        .ok_or_else(|| BridgeError::AttributeNotFound(format!("{} on {}", attribute, name)))
}

fn operation_not_found(name: &ExternalName, operation: &str) -> BridgeError {
    BridgeError::OperationNotFound(format!("{} on {}", operation, name))
}

fn is_excluded(excluded: &[ResourcePath], path: &ResourcePath) -> bool {
    excluded.iter().any(|e| e == path || e.is_ancestor_of(path))
}

/// Counts addressable, non-excluded resources
struct ResourceCounter<'a> {
    excluded: &'a [ResourcePath],
    count: usize,
}

impl ResourceVisitor for ResourceCounter<'_> {
    type Output = usize;

    fn on_resource(&mut self, path: &ResourcePath) -> bool {
        if is_excluded(self.excluded, path) {
            return false;
        }
        self.count += 1;
        true
    }

    fn into_result(self) -> usize {
        self.count
    }
}

/// Collects names matching a pattern, pruning subtrees that cannot match
struct QueryVisitor<'a> {
    codec: &'a AddressCodec,
    pattern: Option<&'a ExternalName>,
    excluded: &'a [ResourcePath],
    names: Vec<ExternalName>,
}

impl ResourceVisitor for QueryVisitor<'_> {
    type Output = Vec<ExternalName>;

    fn on_resource(&mut self, path: &ResourcePath) -> bool {
        if is_excluded(self.excluded, path) {
            return false;
        }
        let name = match self.codec.encode(path) {
            Ok(name) => name,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping resource without an external name");
                return false;
            }
        };
        let pattern = match self.pattern {
            Some(pattern) => pattern,
            None => {
                self.names.push(name);
                return true;
            }
        };

        if pattern.matches(&name) {
            self.names.push(name.clone());
        }
        if path.is_empty() {
            return true;
        }
        // Descendants keep every property of this node and add more
        let admitted = name.properties().iter().all(|(k, v)| pattern.admits_property(k, v));
        admitted && (pattern.is_property_list_pattern() || name.properties().len() < pattern.properties().len())
    }

    fn into_result(self) -> Vec<ExternalName> {
        self.names
    }
}
