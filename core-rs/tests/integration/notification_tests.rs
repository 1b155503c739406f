//! Integration tests for notification translation
//!
//! Tests kernel events as external listeners receive them:
//! - Attribute writes reissued as typed attribute change records
//! - Generic fallback when a change cannot be translated
//! - Lifecycle events reissued per domain with increasing sequence numbers
//! - Listener registration and removal

use model_bridge::bridge::{ATTRIBUTE_CHANGE_NOTIFICATION, REGISTRATION_NOTIFICATION, UNREGISTRATION_NOTIFICATION};
use model_bridge::config::BridgePolicy;
use model_bridge::convert::SimpleType;
use model_bridge::kernel::{
    GenericRequest, ManagementKernel, Notification, NotificationFilter, ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION,
};
use model_bridge::{
    BridgeConfig, BridgeError, ExternalName, ExternalNotification, InMemoryKernel, KernelHandle, ManagementBridge,
    ModelBridge, ModelSnapshot, NotificationBridge, NotificationKind, NotificationListener, OpenType, OpenValue,
    TypeConverters, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;

const SNAPSHOT: &str = r#"
registrations:
  - path: /
    description: The server
  - path: /socket-binding=*
    description: A socket binding
    attributes:
      - {name: port, type: INT64, access: READ_WRITE}
      - {name: multicast-port, type: INT64, access: READ_WRITE}
    operations:
      - {name: remove}
  - path: /socket-binding=*/client-mapping=*
    description: A client mapping
    attributes:
      - {name: destination, type: STRING, access: READ_WRITE}
  - path: /core-service=platform-mbean
    description: Platform beans
resources:
  - path: /socket-binding=http
    attributes: {port: 8080}
  - path: /socket-binding=http/client-mapping=default
    attributes: {destination: localhost}
  - path: /socket-binding=https
    attributes: {port: 8443}
  - path: /core-service=platform-mbean
"#;

#[derive(Default)]
struct Collector {
    received: Mutex<Vec<ExternalNotification>>,
}

impl Collector {
    fn received(&self) -> Vec<ExternalNotification> {
        self.received.lock().clone()
    }
}

impl NotificationListener for Collector {
    fn handle_notification(&self, notification: &ExternalNotification) {
        self.received.lock().push(notification.clone());
    }
}

fn kernel() -> Arc<InMemoryKernel> {
    let snapshot = ModelSnapshot::from_yaml_str(SNAPSHOT).unwrap();
    Arc::new(InMemoryKernel::from_snapshot(snapshot).unwrap())
}

fn notification_bridge(kernel: &Arc<InMemoryKernel>) -> NotificationBridge {
    let model = ModelBridge::new(
        "mgmt",
        TypeConverters::legacy(true),
        BridgePolicy::default(),
        vec!["/core-service=platform-mbean".parse().unwrap()],
        KernelHandle::from_shared(kernel.clone()),
    );
    NotificationBridge::new(Arc::new(model))
}

fn name(text: &str) -> ExternalName {
    ExternalName::parse(text).unwrap()
}

#[test]
fn test_attribute_write_delivered_as_typed_change() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    let http = name("mgmt:socket-binding=http");
    notifications.add_listener(&http, collector.clone(), None).unwrap();

    let model = ModelBridge::new(
        "mgmt",
        TypeConverters::legacy(true),
        BridgePolicy::default(),
        Vec::new(),
        KernelHandle::from_shared(kernel.clone()),
    );
    model.set_attribute(&http, "multicastPort", &OpenValue::Long(45688)).unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 1);
    let change = &received[0];
    assert_eq!(change.notification_type, ATTRIBUTE_CHANGE_NOTIFICATION);
    assert_eq!(change.source, http);
    assert_eq!(change.sequence, 1);
    assert_eq!(
        change.kind,
        NotificationKind::AttributeChange {
            attribute: "multicastPort".to_string(),
            attribute_type: OpenType::Simple(SimpleType::Long),
            old_value: OpenValue::Null,
            new_value: OpenValue::Long(45688),
        }
    );
}

#[test]
fn test_untranslatable_change_falls_back_to_generic() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    notifications
        .add_listener(&name("mgmt:socket-binding=http"), collector.clone(), None)
        .unwrap();

    // Written straight to the kernel; "eighty" is no INT64
    let request = GenericRequest::new("write-attribute", "/socket-binding=http".parse().unwrap())
        .with_parameter("name", Value::string("port"))
        .with_parameter("value", Value::string("eighty"));
    assert!(kernel.execute(request).is_success());

    let received = collector.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].notification_type, ATTRIBUTE_VALUE_WRITTEN_NOTIFICATION);
    match &received[0].kind {
        NotificationKind::Generic { data } => {
            assert_eq!(data.get("new-value"), Some(&Value::string("eighty")));
        }
        other => panic!("Expected a generic notification, got {:?}", other),
    }
}

#[test]
fn test_listener_filter_applies() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    let http = name("mgmt:socket-binding=http");
    let only_port: NotificationFilter = Arc::new(|n: &Notification| {
        n.data.get("name").and_then(Value::as_str) == Some("port")
    });
    notifications
        .add_listener(&http, collector.clone(), Some(only_port))
        .unwrap();

    let model = ModelBridge::new(
        "mgmt",
        TypeConverters::legacy(true),
        BridgePolicy::default(),
        Vec::new(),
        KernelHandle::from_shared(kernel.clone()),
    );
    model.set_attribute(&http, "multicastPort", &OpenValue::Long(1)).unwrap();
    model.set_attribute(&http, "port", &OpenValue::Long(8081)).unwrap();

    let received = collector.received();
    assert_eq!(received.len(), 1);
    match &received[0].kind {
        NotificationKind::AttributeChange { attribute, old_value, .. } => {
            assert_eq!(attribute, "port");
            assert_eq!(old_value, &OpenValue::Long(8080));
        }
        other => panic!("Expected an attribute change, got {:?}", other),
    }
}

#[test]
fn test_lifecycle_events_not_delivered_to_resource_listeners() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    let https = name("mgmt:socket-binding=https");
    notifications.add_listener(&https, collector.clone(), None).unwrap();

    let request = GenericRequest::new("remove", "/socket-binding=https".parse().unwrap());
    assert!(kernel.execute(request).is_success());

    assert!(collector.received().is_empty());
}

#[test]
fn test_removal_translated_once_per_domain() {
    let kernel = kernel();
    let bridge = ManagementBridge::new(&BridgeConfig::default(), KernelHandle::from_shared(kernel.clone())).unwrap();
    let legacy = Arc::new(Collector::default());
    let expr = Arc::new(Collector::default());
    bridge
        .domain("mgmt")
        .unwrap()
        .notifications
        .add_registration_listener(legacy.clone());
    bridge
        .domain("mgmt.expr")
        .unwrap()
        .notifications
        .add_registration_listener(expr.clone());

    let request = GenericRequest::new("remove", "/socket-binding=http".parse().unwrap());
    assert!(kernel.execute(request).is_success());

    for (collector, domain) in [(&legacy, "mgmt"), (&expr, "mgmt.expr")] {
        let received = collector.received();
        let sources: Vec<String> = received.iter().map(|n| n.source.to_string()).collect();
        assert_eq!(
            sources,
            vec![
                format!("{}:socket-binding=http,client-mapping=default", domain),
                format!("{}:socket-binding=http", domain),
            ]
        );
        assert!(received.iter().all(|n| n.notification_type == UNREGISTRATION_NOTIFICATION));
        assert!(received
            .iter()
            .all(|n| n.kind == NotificationKind::Registration { registered: false }));
        assert!(received.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }
    bridge.close();
}

#[test]
fn test_registration_event_on_add() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    notifications.add_registration_listener(collector.clone());

    let request = GenericRequest::new("add", "/socket-binding=ajp".parse().unwrap())
        .with_parameter("port", Value::Int64(8009));
    assert!(kernel.execute(request).is_success());

    let received = collector.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].notification_type, REGISTRATION_NOTIFICATION);
    assert_eq!(received[0].source, name("mgmt:socket-binding=ajp"));
    assert_eq!(notifications.sequence().current(), 1);
}

#[test]
fn test_excluded_sources_are_silent() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    notifications.add_registration_listener(collector.clone());

    let request = GenericRequest::new("remove", "/core-service=platform-mbean".parse().unwrap());
    assert!(kernel.execute(request).is_success());

    assert!(collector.received().is_empty());
    assert_eq!(notifications.sequence().current(), 0);
}

#[test]
fn test_remove_listener() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    let collector = Arc::new(Collector::default());
    let http = name("mgmt:socket-binding=http");
    let https = name("mgmt:socket-binding=https");

    let id = notifications.add_listener(&http, collector.clone(), None).unwrap();
    assert_eq!(notifications.listener_count(), 1);

    assert!(matches!(
        notifications.remove_listener(&https, id),
        Err(BridgeError::ListenerNotFound(_))
    ));
    notifications.remove_listener(&http, id).unwrap();
    assert_eq!(notifications.listener_count(), 0);
    assert!(matches!(
        notifications.remove_listener(&http, id),
        Err(BridgeError::ListenerNotFound(_))
    ));
}

#[test]
fn test_close_unregisters_kernel_handlers() {
    let kernel = kernel();
    let baseline = kernel.handler_count();
    let notifications = notification_bridge(&kernel);
    notifications
        .add_listener(&name("mgmt:socket-binding=http"), Arc::new(Collector::default()), None)
        .unwrap();
    assert_eq!(kernel.handler_count(), baseline + 2);

    drop(notifications);
    assert_eq!(kernel.handler_count(), baseline);
}

#[test]
fn test_listener_on_unknown_resource_rejected() {
    let kernel = kernel();
    let notifications = notification_bridge(&kernel);
    assert!(matches!(
        notifications.add_listener(&name("mgmt:socket-binding=none"), Arc::new(Collector::default()), None),
        Err(BridgeError::AddressNotResolvable(_))
    ));
}
