//! Integration tests for the per-domain dispatcher
//!
//! Tests complete bridge calls against a snapshot-loaded kernel:
//! - Name resolution and access gating
//! - Attribute reads and writes in both conversion modes
//! - Operation invocation and child creation
//! - Read-only and restricted modes

use model_bridge::config::BridgePolicy;
use model_bridge::kernel::{GenericRequest, GenericResult};
use model_bridge::{
    BridgeError, ExternalName, InMemoryKernel, KernelHandle, ModelBridge, ModelSnapshot, OpenValue, ResourcePath,
    TypeConverters, Value,
};
use std::sync::Arc;

const SNAPSHOT: &str = r#"
registrations:
  - path: /
    description: The server
    operations:
      - {name: read-resource, read-only: true}
      - {name: reload}
    children:
      - key: subsystem
        add: {name: add}
  - path: /subsystem=*
    description: A subsystem
    attributes:
      - {name: enabled, type: BOOLEAN, access: READ_WRITE}
    operations:
      - {name: add}
      - {name: remove}
    children:
      - key: binding
        add:
          name: add
          parameters:
            - {name: port, type: INT64}
  - path: /subsystem=*/binding=*
    description: A socket binding
    attributes:
      - {name: port, type: INT64, access: READ_WRITE}
      - {name: bound, type: BOOLEAN, access: METRIC}
      - {name: interface, type: STRING, access: READ_WRITE}
      - {name: key-password, type: STRING, access: READ_WRITE}
    operations:
      - name: set-port-offset
        parameters:
          - {name: offset, type: INT64}
        reply: {type: INT64}
      - name: status
        read-only: true
        reply: {type: STRING}
      - {name: remove}
resources:
  - path: /subsystem=net
    attributes: {enabled: true}
  - path: /subsystem=net/binding=http
    attributes: {port: 8080, bound: true, interface: {EXPRESSION_VALUE: "${bind.address:127.0.0.1}"}}
  - path: /subsystem=secure
  - path: /subsystem=secure/binding=https
    attributes: {port: 8443}
  - path: /core-service=platform-mbean
access:
  rules:
    - {path: /subsystem=secure, addressable: false}
    - path: /subsystem=net/binding=*
      denyRead: [key-password]
      denyWrite: [key-password]
      denyOperations: [set-port-offset]
"#;

fn kernel() -> Arc<InMemoryKernel> {
    let snapshot = ModelSnapshot::from_yaml_str(SNAPSHOT).unwrap();
    let kernel = Arc::new(InMemoryKernel::from_snapshot(snapshot).unwrap());
    kernel.register_operation(
        "set-port-offset",
        Arc::new(|request: &GenericRequest| {
            let offset = match request.parameter("offset") {
                Some(Value::Int64(offset)) => *offset,
                _ => return GenericResult::failed("offset is required"),
            };
            GenericResult::success(Value::Int64(8080 + offset))
        }),
    );
    kernel.register_operation(
        "status",
        Arc::new(|_: &GenericRequest| GenericResult::success(Value::string("running"))),
    );
    kernel
}

fn bridge_with(kernel: &Arc<InMemoryKernel>, converters: TypeConverters, policy: BridgePolicy) -> ModelBridge {
    ModelBridge::new(
        "mgmt",
        converters,
        policy,
        vec!["/core-service=platform-mbean".parse().unwrap()],
        KernelHandle::from_shared(kernel.clone()),
    )
}

fn legacy(kernel: &Arc<InMemoryKernel>) -> ModelBridge {
    bridge_with(kernel, TypeConverters::legacy(true), BridgePolicy::default())
}

fn name(text: &str) -> ExternalName {
    ExternalName::parse(text).unwrap()
}

fn http() -> ExternalName {
    name("mgmt:subsystem=net,binding=http")
}

#[test]
fn test_resolves_name_in_any_property_order() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let path = bridge.resolve_path(&name("mgmt:binding=http,subsystem=net")).unwrap();
    assert_eq!(path, ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]));
}

#[test]
fn test_missing_resource_is_not_resolvable() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let missing = name("mgmt:subsystem=net,binding=missing");
    assert!(matches!(
        bridge.get_attribute(&missing, "port"),
        Err(BridgeError::AddressNotResolvable(_))
    ));
    assert!(!bridge.is_registered(&missing));
}

#[test]
fn test_hidden_resource_is_not_addressable() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let secure = name("mgmt:subsystem=secure");
    assert!(matches!(
        bridge.get_attribute(&secure, "enabled"),
        Err(BridgeError::NotAddressable(_))
    ));
    assert!(matches!(bridge.describe(&secure), Err(BridgeError::NotAddressable(_))));
}

#[test]
fn test_query_skips_hidden_and_excluded_subtrees() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let names: Vec<String> = bridge.query_names(None).iter().map(|n| n.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "mgmt:management-root=server",
            "mgmt:subsystem=net",
            "mgmt:subsystem=net,binding=http",
        ]
    );
    assert_eq!(bridge.resource_count(), 3);
}

#[test]
fn test_legacy_read_resolves_expressions() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    assert_eq!(bridge.get_attribute(&http(), "port").unwrap(), OpenValue::Long(8080));
    assert_eq!(
        bridge.get_attribute(&http(), "interface").unwrap(),
        OpenValue::string("127.0.0.1")
    );
    assert_eq!(bridge.get_attribute(&http(), "bound").unwrap(), OpenValue::Boolean(true));
}

#[test]
fn test_expression_mode_keeps_expressions_and_stringifies() {
    let kernel = kernel();
    let bridge = bridge_with(&kernel, TypeConverters::expression_aware(), BridgePolicy::default());
    assert_eq!(
        bridge.get_attribute(&http(), "interface").unwrap(),
        OpenValue::string("${bind.address:127.0.0.1}")
    );
    assert_eq!(bridge.get_attribute(&http(), "port").unwrap(), OpenValue::string("8080"));

    bridge
        .set_attribute(&http(), "port", &OpenValue::string("${http.port:9090}"))
        .unwrap();
    let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    assert_eq!(
        kernel.attribute(&path, "port"),
        Some(Value::Expression("${http.port:9090}".to_string()))
    );
}

#[test]
fn test_bulk_attribute_access() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    bridge
        .set_attributes(
            &http(),
            &[
                ("port".to_string(), OpenValue::Long(9000)),
                ("interface".to_string(), OpenValue::string("0.0.0.0")),
            ],
        )
        .unwrap();
    let values = bridge.get_attributes(&http(), &["port", "interface"]).unwrap();
    assert_eq!(
        values,
        vec![
            ("port".to_string(), OpenValue::Long(9000)),
            ("interface".to_string(), OpenValue::string("0.0.0.0")),
        ]
    );

    let err = bridge.get_attributes(&http(), &["port", "nope"]).unwrap_err();
    assert!(matches!(err, BridgeError::AttributeNotFound(_)));
}

#[test]
fn test_write_metric_attribute_is_rejected_before_dispatch() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    assert!(matches!(
        bridge.set_attribute(&http(), "bound", &OpenValue::Boolean(false)),
        Err(BridgeError::AttributeNotWritable(_))
    ));
}

#[test]
fn test_type_mismatch_aborts_write() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    assert!(matches!(
        bridge.set_attribute(&http(), "port", &OpenValue::string("not a number")),
        Err(BridgeError::TypeConversion(_))
    ));
    let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    assert_eq!(kernel.attribute(&path, "port"), Some(Value::Int64(8080)));
}

#[test]
fn test_invoke_resolves_camel_case_name() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let reply = bridge.invoke(&http(), "setPortOffset", &[OpenValue::Long(100)]).unwrap();
    assert_eq!(reply, Some(OpenValue::Long(8180)));
}

#[test]
fn test_invoke_without_reply_returns_none() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let reply = bridge.invoke(&name("mgmt:subsystem=net,binding=http"), "remove", &[]).unwrap();
    assert_eq!(reply, None);
    assert!(!bridge.is_registered(&http()));
}

#[test]
fn test_kernel_failure_is_surfaced() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let err = bridge.invoke(&name("mgmt:management-root=server"), "reload", &[]).unwrap_err();
    match err {
        BridgeError::KernelExecutionFailure(description) => {
            assert!(description.contains("not supported"));
        }
        other => panic!("Expected kernel failure, got {:?}", other),
    }
}

#[test]
fn test_child_add_creates_wildcard_child() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let net = name("mgmt:subsystem=net");
    let reply = bridge
        .invoke(&net, "addBinding", &[OpenValue::string("ajp"), OpenValue::Long(8009)])
        .unwrap();
    assert_eq!(reply, None);

    let ajp = name("mgmt:subsystem=net,binding=ajp");
    assert!(bridge.is_registered(&ajp));
    assert_eq!(bridge.get_attribute(&ajp, "port").unwrap(), OpenValue::Long(8009));
}

#[test]
fn test_child_add_requires_name_parameter() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    assert!(matches!(
        bridge.invoke(&name("mgmt:subsystem=net"), "addBinding", &[]),
        Err(BridgeError::ParameterCountMismatch { expected: 2, actual: 0 })
    ));
}

#[test]
fn test_root_descriptor_hides_global_operations() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    let descriptor = bridge.describe(&name("mgmt:management-root=server")).unwrap();
    let operations: Vec<&str> = descriptor.operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(operations, vec!["reload", "addSubsystem"]);
}

#[test]
fn test_read_only_mode() {
    let kernel = kernel();
    let policy = BridgePolicy {
        writable: false,
        enforce_access_control: false,
    };
    let bridge = bridge_with(&kernel, TypeConverters::legacy(true), policy);

    assert!(matches!(
        bridge.set_attribute(&http(), "port", &OpenValue::Long(1)),
        Err(BridgeError::AttributeNotWritable(_))
    ));
    assert!(matches!(
        bridge.invoke(&http(), "setPortOffset", &[OpenValue::Long(1)]),
        Err(BridgeError::OperationNotFound(_))
    ));
    assert_eq!(
        bridge.invoke(&http(), "status", &[]).unwrap(),
        Some(OpenValue::string("running"))
    );

    let descriptor = bridge.describe(&http()).unwrap();
    let operations: Vec<&str> = descriptor.operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(operations, vec!["status"]);
}

#[test]
fn test_restricted_mode_applies_access_decision() {
    let kernel = kernel();
    let policy = BridgePolicy {
        writable: true,
        enforce_access_control: true,
    };
    let bridge = bridge_with(&kernel, TypeConverters::legacy(true), policy);

    assert!(matches!(
        bridge.get_attribute(&http(), "keyPassword"),
        Err(BridgeError::NotAuthorized(_))
    ));
    assert!(matches!(
        bridge.set_attribute(&http(), "keyPassword", &OpenValue::string("x")),
        Err(BridgeError::NotAuthorized(_))
    ));
    assert!(matches!(
        bridge.invoke(&http(), "setPortOffset", &[OpenValue::Long(1)]),
        Err(BridgeError::NotAuthorized(_))
    ));
    assert_eq!(bridge.get_attribute(&http(), "port").unwrap(), OpenValue::Long(8080));

    let descriptor = bridge.describe(&http()).unwrap();
    assert!(!descriptor.attribute("keyPassword").unwrap().writable);
    assert!(descriptor.operation("setPortOffset").is_none());
}

#[test]
fn test_unrestricted_mode_ignores_attribute_denials() {
    let kernel = kernel();
    let bridge = legacy(&kernel);
    bridge
        .set_attribute(&http(), "keyPassword", &OpenValue::string("secret"))
        .unwrap();
    assert_eq!(
        bridge.get_attribute(&http(), "keyPassword").unwrap(),
        OpenValue::string("secret")
    );
    let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    assert_eq!(kernel.attribute(&path, "key-password"), Some(Value::string("secret")));
}
