//! Notification bridge
//!
//! Translates kernel notifications into external ones for one domain.
//!
//! - Each listener added on a resource is wrapped in a kernel handler scoped
//!   to that resource's path. Lifecycle events never reach these handlers.
//! - A single delegate handler per domain receives every `resource-added` and
//!   `resource-removed` event and reissues it as a registration event to the
//!   domain's registration listeners, numbered by the domain's [`SequenceCounter`].
//! - `attribute-value-written` events become typed attribute change records.
//!   The attribute type is looked up again at delivery time; when that fails
//!   the event is delivered as a generic notification instead.
//!
//! Handlers run on kernel delivery threads and keep no mutable state apart
//! from the shared counter.

use crate::bridge::dispatcher::ModelBridge;
use crate::convert::{OpenType, OpenValue, TypeConverters};
use crate::errors::{BridgeError, Result};
use crate::kernel::{
    AddressPattern, HandlerId, MetadataProvider, Notification, NotificationFilter,
    NotificationHandler, ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION, RESOURCE_ADDED_NOTIFICATION,
};
use crate::model::{ResourcePath, Value};
use crate::naming::{AddressCodec, ExternalName};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Type of the external event reissued for an added resource
pub const REGISTRATION_NOTIFICATION: &str = "entity.registered";
/// Type of the external event reissued for a removed resource
pub const UNREGISTRATION_NOTIFICATION: &str = "entity.unregistered";
/// Type of a typed attribute change record
pub const ATTRIBUTE_CHANGE_NOTIFICATION: &str = "attribute.change";

/// Monotonic sequence numbers for one domain; never reset
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next number, starting at 1
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last number handed out, 0 before the first
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// Untranslated event carrying the kernel's data payload
    Generic { data: Value },
    AttributeChange {
        attribute: String,
        attribute_type: OpenType,
        old_value: OpenValue,
        new_value: OpenValue,
    },
    Registration { registered: bool },
}

/// Notification as seen by external listeners
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalNotification {
    pub notification_type: String,
    pub source: ExternalName,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub kind: NotificationKind,
}

/// External listener; called on kernel delivery threads
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &ExternalNotification);
}

type ListenerList = Arc<RwLock<Vec<(HandlerId, Arc<dyn NotificationListener>)>>>;

struct ListenerRegistration {
    name: ExternalName,
    handler_id: HandlerId,
}

/// Notification bridge for one domain
pub struct NotificationBridge {
    bridge: Arc<ModelBridge>,
    sequence: Arc<SequenceCounter>,
    registration_listeners: ListenerList,
    delegate_handler: Mutex<Option<HandlerId>>,
    registrations: Mutex<Vec<ListenerRegistration>>,
}

impl NotificationBridge {
    /// Create the bridge and register its delegate handler with the kernel
    pub fn new(bridge: Arc<ModelBridge>) -> Self {
        let sequence = Arc::new(SequenceCounter::new());
        let registration_listeners: ListenerList = Arc::new(RwLock::new(Vec::new()));
        let delegate = DelegateHandler {
            codec: bridge.codec().clone(),
            excluded_check: bridge.clone(),
            sequence: sequence.clone(),
            listeners: registration_listeners.clone(),
        };
        let lifecycle_only: NotificationFilter = Arc::new(|n: &Notification| n.is_lifecycle());
        let handle = bridge.handle();
        let delegate_id = handle
            .kernel
            .register_handler(AddressPattern::Any, Arc::new(delegate), lifecycle_only);
        info!(domain = bridge.domain(), handler = %delegate_id, "Registered lifecycle delegate handler");

        Self {
            bridge,
            sequence,
            registration_listeners,
            delegate_handler: Mutex::new(Some(delegate_id)),
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn domain(&self) -> &str {
        self.bridge.domain()
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    /// Receive registration and unregistration events for the whole domain
    pub fn add_registration_listener(&self, listener: Arc<dyn NotificationListener>) -> HandlerId {
        let id = HandlerId::new();
        self.registration_listeners.write().push((id, listener));
        id
    }

    pub fn remove_registration_listener(&self, id: HandlerId) -> Result<()> {
        let mut listeners = self.registration_listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        if listeners.len() == before {
            return Err(BridgeError::ListenerNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Listen for notifications emitted by the resource behind `name`
    ///
    /// # Arguments
    /// * `name` - External name of an addressable resource
    /// * `listener` - Receiver of the translated notifications
    /// * `filter` - Optional extra predicate on the kernel notification
    ///
    /// # Returns
    /// Id to pass to [`remove_listener`](Self::remove_listener)
    pub fn add_listener(
        &self,
        name: &ExternalName,
        listener: Arc<dyn NotificationListener>,
        filter: Option<NotificationFilter>,
    ) -> Result<HandlerId> {
        let path = self.bridge.resolve_path(name)?;
        if !self.bridge.handle().access.decide(&path, false).addressable {
            return Err(BridgeError::NotAddressable(name.to_string()));
        }

        let handle = self.bridge.handle();
        let wrapper = ListenerHandler {
            name: name.clone(),
            codec: self.bridge.codec().clone(),
            converters: self.bridge.converters().clone(),
            metadata: handle.metadata.clone(),
            sequence: self.sequence.clone(),
            listener,
        };
        let filter: NotificationFilter = Arc::new(move |n: &Notification| {
            !n.is_lifecycle() && filter.as_ref().map_or(true, |f| f(n))
        });
        let handler_id = handle
            .kernel
            .register_handler(AddressPattern::Path(path), Arc::new(wrapper), filter);

        self.registrations.lock().push(ListenerRegistration {
            name: name.clone(),
            handler_id,
        });
        Ok(handler_id)
    }

    /// Remove a listener added on `name`
    ///
    /// # Errors
    /// `ListenerNotFound` when `id` was not returned by `add_listener` for `name`
    pub fn remove_listener(&self, name: &ExternalName, id: HandlerId) -> Result<()> {
        let mut registrations = self.registrations.lock();
        let position = registrations
            .iter()
            .position(|r| r.handler_id == id && &r.name == name)
            .ok_or_else(|| BridgeError::ListenerNotFound(format!("{} on {}", id, name)))?;
        let registration = registrations.remove(position);
        drop(registrations);

        self.bridge.handle().kernel.unregister_handler(registration.handler_id);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Unregister every kernel handler this bridge installed
    pub fn close(&self) {
        let kernel = &self.bridge.handle().kernel;
        if let Some(id) = self.delegate_handler.lock().take() {
            kernel.unregister_handler(id);
        }
        for registration in self.registrations.lock().drain(..) {
            kernel.unregister_handler(registration.handler_id);
        }
        self.registration_listeners.write().clear();
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reissues lifecycle events as registration events
struct DelegateHandler {
    codec: AddressCodec,
    excluded_check: Arc<ModelBridge>,
    sequence: Arc<SequenceCounter>,
    listeners: ListenerList,
}

impl NotificationHandler for DelegateHandler {
    fn handle_notification(&self, notification: &Notification) {
        if self.excluded_check.is_excluded(&notification.source) {
            return;
        }
        let source = match self.codec.encode(&notification.source) {
            Ok(name) => name,
            Err(e) => {
                warn!(source = %notification.source, error = %e, "Cannot name lifecycle event source");
                return;
            }
        };
        let registered = notification.notification_type == RESOURCE_ADDED_NOTIFICATION;
        let external = ExternalNotification {
            notification_type: if registered {
                REGISTRATION_NOTIFICATION
            } else {
                UNREGISTRATION_NOTIFICATION
            }
            .to_string(),
            source,
            sequence: self.sequence.next(),
            timestamp: notification.timestamp,
            message: notification.message.clone(),
            kind: NotificationKind::Registration { registered },
        };

        let listeners: Vec<Arc<dyn NotificationListener>> =
            self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener.handle_notification(&external);
        }
    }
}

/// Wraps one external listener on one resource
struct ListenerHandler {
    name: ExternalName,
    codec: AddressCodec,
    converters: TypeConverters,
    metadata: Arc<dyn MetadataProvider>,
    sequence: Arc<SequenceCounter>,
    listener: Arc<dyn NotificationListener>,
}

impl ListenerHandler {
    fn attribute_change(&self, notification: &Notification) -> Result<NotificationKind> {
        let attribute = notification
            .data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::TypeConversion("Attribute change without a name".to_string()))?;
        let metadata = self
            .metadata
            .describe(&notification.source)
            .ok_or_else(|| BridgeError::RegistrationNotFound(notification.source.to_string()))?;
        let definition = metadata
            .attribute(attribute)
            .ok_or_else(|| BridgeError::AttributeNotFound(attribute.to_string()))?;

        let td = &definition.type_descriptor;
        let undefined = Value::Undefined;
        let old = notification.data.get("old-value").unwrap_or(&undefined);
        let new = notification.data.get("new-value").unwrap_or(&undefined);
        Ok(NotificationKind::AttributeChange {
            attribute: crate::naming::kebab_to_camel(attribute),
            attribute_type: self.converters.describe(td),
            old_value: self.converters.encode(td, old)?,
            new_value: self.converters.encode(td, new)?,
        })
    }

    fn source_name(&self, source: &ResourcePath) -> ExternalName {
        self.codec.encode(source).unwrap_or_else(|_| self.name.clone())
    }
}

impl NotificationHandler for ListenerHandler {
    fn handle_notification(&self, notification: &Notification) {
        let generic = || NotificationKind::Generic {
            data: notification.data.clone(),
        };
        let (notification_type, kind) = if notification.notification_type == ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION {
            match self.attribute_change(notification) {
                Ok(kind) => (ATTRIBUTE_CHANGE_NOTIFICATION.to_string(), kind),
                Err(e) => {
                    warn!(source = %notification.source, error = %e, "Delivering attribute change as a generic notification");
                    (notification.notification_type.clone(), generic())
                }
            }
        } else {
            (notification.notification_type.clone(), generic())
        };

        let external = ExternalNotification {
            notification_type,
            source: self.source_name(&notification.source),
            sequence: self.sequence.next(),
            timestamp: notification.timestamp,
            message: notification.message.clone(),
            kind,
        };
        self.listener.handle_notification(&external);
    }
}
