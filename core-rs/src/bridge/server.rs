//! Multi-domain facade
//!
//! [`ManagementBridge`] serves every configured domain over the same kernel.
//! Each domain owns its own converters, codec and notification bridge, so
//! each has its own registration sequence. Calls are routed by the domain of
//! the name and recorded in the audit log when one is configured.

use crate::audit::{AuditEntry, BridgeAuditLogger};
use crate::bridge::dispatcher::ModelBridge;
use crate::bridge::notification::{NotificationBridge, NotificationListener};
use crate::config::BridgeConfig;
use crate::convert::{OpenValue, TypeConverters};
use crate::descriptor::EntityDescriptor;
use crate::errors::{BridgeError, Result};
use crate::kernel::{HandlerId, KernelHandle, NotificationFilter};
use crate::naming::ExternalName;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

/// One served domain
pub struct DomainBridge {
    pub model: Arc<ModelBridge>,
    pub notifications: NotificationBridge,
}

/// Facade over every configured domain
pub struct ManagementBridge {
    domains: Vec<DomainBridge>,
    audit: Option<BridgeAuditLogger>,
}

impl ManagementBridge {
    /// Build the domains described by `config` over `handle`
    ///
    /// # Errors
    /// `Config` when the configuration does not validate
    pub fn new(config: &BridgeConfig, handle: KernelHandle) -> Result<Self> {
        config.validate()?;

        let domains = config
            .domains()
            .into_iter()
            .map(|(domain, expression_aware)| {
                let converters = if expression_aware {
                    TypeConverters::expression_aware()
                } else {
                    TypeConverters::legacy(config.proper_property_format).with_resolver(config.resolver())
                };
                let model = Arc::new(ModelBridge::new(
                    domain,
                    converters,
                    config.policy(),
                    config.excluded_addresses.clone(),
                    handle.clone(),
                ));
                let notifications = NotificationBridge::new(model.clone());
                info!(domain, expression_aware, "Serving domain");
                DomainBridge { model, notifications }
            })
            .collect();

        let audit = config.audit.as_ref().map(BridgeAuditLogger::new);
        Ok(Self { domains, audit })
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.iter().map(|d| d.model.domain()).collect()
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainBridge> {
        self.domains.iter().find(|d| d.model.domain() == domain)
    }

    pub fn audit(&self) -> Option<&BridgeAuditLogger> {
        self.audit.as_ref()
    }

    /// Names matching `pattern` across every domain it addresses
    pub fn query_names(&self, pattern: Option<&ExternalName>) -> Vec<ExternalName> {
        let data = json!({ "pattern": pattern.map(|p| p.to_string()) });
        let name = pattern.map(|p| p.to_string()).unwrap_or_default();
        self.audited("query-names", &name, true, data, || {
            Ok(self
                .domains
                .iter()
                .flat_map(|d| d.model.query_names(pattern))
                .collect())
        })
        .unwrap_or_default()
    }

    /// Addressable resources across every domain
    pub fn resource_count(&self) -> usize {
        self.domains.iter().map(|d| d.model.resource_count()).sum()
    }

    pub fn is_registered(&self, name: &ExternalName) -> bool {
        self.route(name).map(|d| d.model.is_registered(name)).unwrap_or(false)
    }

    pub fn describe(&self, name: &ExternalName) -> Result<EntityDescriptor> {
        self.audited("describe", &name.to_string(), true, JsonValue::Null, || {
            self.route(name)?.model.describe(name)
        })
    }

    pub fn get_attribute(&self, name: &ExternalName, attribute: &str) -> Result<OpenValue> {
        let data = json!({ "attribute": attribute });
        self.audited("get-attribute", &name.to_string(), true, data, || {
            self.route(name)?.model.get_attribute(name, attribute)
        })
    }

    pub fn get_attributes(&self, name: &ExternalName, attributes: &[&str]) -> Result<Vec<(String, OpenValue)>> {
        let data = json!({ "attributes": attributes });
        self.audited("get-attributes", &name.to_string(), true, data, || {
            self.route(name)?.model.get_attributes(name, attributes)
        })
    }

    pub fn set_attribute(&self, name: &ExternalName, attribute: &str, value: &OpenValue) -> Result<()> {
        let data = json!({ "attribute": attribute, "value": value.to_json() });
        self.audited("set-attribute", &name.to_string(), false, data, || {
            self.route(name)?.model.set_attribute(name, attribute, value)
        })
    }

    pub fn set_attributes(&self, name: &ExternalName, values: &[(String, OpenValue)]) -> Result<()> {
        let attributes: Vec<&str> = values.iter().map(|(a, _)| a.as_str()).collect();
        let data = json!({ "attributes": attributes });
        self.audited("set-attributes", &name.to_string(), false, data, || {
            self.route(name)?.model.set_attributes(name, values)
        })
    }

    pub fn invoke(&self, name: &ExternalName, operation: &str, params: &[OpenValue]) -> Result<Option<OpenValue>> {
        let data = json!({
            "operation": operation,
            "parameterCount": params.len(),
        });
        self.audited("invoke", &name.to_string(), false, data, || {
            self.route(name)?.model.invoke(name, operation, params)
        })
    }

    pub fn add_listener(
        &self,
        name: &ExternalName,
        listener: Arc<dyn NotificationListener>,
        filter: Option<NotificationFilter>,
    ) -> Result<HandlerId> {
        self.route(name)?.notifications.add_listener(name, listener, filter)
    }

    pub fn remove_listener(&self, name: &ExternalName, id: HandlerId) -> Result<()> {
        self.route(name)?.notifications.remove_listener(name, id)
    }

    /// Unregister every kernel handler installed by any domain
    pub fn close(&self) {
        for domain in &self.domains {
            domain.notifications.close();
        }
    }

    // ===== PRIVATE HELPER METHODS =====

    fn route(&self, name: &ExternalName) -> Result<&DomainBridge> {
        self.domains
            .iter()
            .find(|d| d.model.domain() == name.domain())
            .ok_or_else(|| BridgeError::AddressNotResolvable(name.to_string()))
    }

    fn audited<T>(
        &self,
        operation: &str,
        name: &str,
        read_only: bool,
        data: JsonValue,
        call: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = call();
        if let Some(audit) = self.audit.as_ref().filter(|a| a.records(read_only)) {
            let entry = AuditEntry::new(operation, name, read_only).with_data(data);
            let entry = match &result {
                Ok(_) => entry.succeeded(),
                Err(e) => entry.failed(e.to_string()),
            };
            if let Err(e) = audit.record(entry) {
                warn!(operation, name, error = %e, "Failed to write audit entry");
            }
        }
        result
    }
}
