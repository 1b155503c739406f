//! Integration tests for the multi-domain facade
//!
//! Tests a bridge built from a configuration file:
//! - Domain selection and per-domain conversion
//! - Configured expression properties
//! - Queries across domains
//! - Audit trail of writes and failures
//! - Read-only configuration

use model_bridge::{
    BridgeConfig, BridgeError, ExternalName, InMemoryKernel, KernelHandle, ManagementBridge, ModelSnapshot,
    OpenValue,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"
registrations:
  - path: /
    description: The server
  - path: /interface=*
    description: A network interface
    attributes:
      - {name: inet-address, type: STRING, access: READ_WRITE}
      - {name: keystore-password, type: STRING, access: READ_WRITE}
      - {name: mtu, type: INT64, access: READ_WRITE}
    operations:
      - {name: restart}
resources:
  - path: /interface=public
    attributes:
      inet-address: {EXPRESSION_VALUE: "${bind.address:127.0.0.1}"}
      mtu: 1500
  - path: /interface=management
    attributes:
      inet-address: 127.0.0.1
"#;

fn handle() -> KernelHandle {
    let snapshot = ModelSnapshot::from_yaml_str(SNAPSHOT).unwrap();
    KernelHandle::from_shared(Arc::new(InMemoryKernel::from_snapshot(snapshot).unwrap()))
}

fn write_config(dir: &TempDir, yaml: &str) -> BridgeConfig {
    let path = dir.path().join("bridge.yaml");
    fs::write(&path, yaml).unwrap();
    BridgeConfig::load(&path).unwrap()
}

fn name(text: &str) -> ExternalName {
    ExternalName::parse(text).unwrap()
}

#[test]
fn test_config_file_selects_domains_and_properties() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
legacyDomain: server
expressionDomain: ~
expressionProperties:
  bind.address: 10.0.0.1
"#,
    );
    let bridge = ManagementBridge::new(&config, handle()).unwrap();

    assert_eq!(bridge.domain_names(), vec!["server"]);
    assert_eq!(
        bridge
            .get_attribute(&name("server:interface=public"), "inetAddress")
            .unwrap(),
        OpenValue::string("10.0.0.1")
    );
    assert!(matches!(
        bridge.get_attribute(&name("mgmt:interface=public"), "inetAddress"),
        Err(BridgeError::AddressNotResolvable(_))
    ));
}

#[test]
fn test_default_domains_share_one_tree() {
    let bridge = ManagementBridge::new(&BridgeConfig::default(), handle()).unwrap();
    let legacy = name("mgmt:interface=public");
    let expr = name("mgmt.expr:interface=public");

    assert_eq!(bridge.get_attribute(&legacy, "inet-address").unwrap(), OpenValue::string("127.0.0.1"));
    assert_eq!(
        bridge.get_attribute(&expr, "inet-address").unwrap(),
        OpenValue::string("${bind.address:127.0.0.1}")
    );

    bridge.set_attribute(&expr, "mtu", &OpenValue::string("9000")).unwrap();
    assert_eq!(bridge.get_attribute(&legacy, "mtu").unwrap(), OpenValue::Long(9000));
}

#[test]
fn test_query_across_domains() {
    let bridge = ManagementBridge::new(&BridgeConfig::default(), handle()).unwrap();

    let all: Vec<String> = bridge
        .query_names(Some(&name("*:interface=*")))
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        all,
        vec![
            "mgmt:interface=management",
            "mgmt:interface=public",
            "mgmt.expr:interface=management",
            "mgmt.expr:interface=public",
        ]
    );

    let expr_only = bridge.query_names(Some(&name("mgmt.expr:*")));
    assert_eq!(expr_only.len(), 3);
    assert!(expr_only.iter().all(|n| n.domain() == "mgmt.expr"));

    assert_eq!(bridge.resource_count(), 6);
}

#[test]
fn test_audit_records_writes_and_failures() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("audit").join("bridge.log");
    let config = write_config(
        &dir,
        &format!(
            "audit:\n  logPath: {}\n",
            log_path.display()
        ),
    );
    let bridge = ManagementBridge::new(&config, handle()).unwrap();
    let public = name("mgmt:interface=public");

    bridge.get_attribute(&public, "mtu").unwrap();
    bridge
        .set_attribute(&public, "keystorePassword", &OpenValue::string("hunter2"))
        .unwrap();
    assert!(bridge.invoke(&public, "restart", &[]).is_err());

    let entries = bridge.audit().unwrap().entries().unwrap();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].operation, "set-attribute");
    assert_eq!(entries[0].name, "mgmt:interface=public");
    assert!(entries[0].success);
    assert_eq!(entries[0].data["value"], serde_json::json!("[REDACTED]"));

    assert_eq!(entries[1].operation, "invoke");
    assert!(!entries[1].success);
    assert!(entries[1].error.as_deref().unwrap_or_default().contains("restart"));

    let raw = fs::read_to_string(&log_path).unwrap();
    assert!(!raw.contains("hunter2"));
}

#[test]
fn test_audit_of_reads_is_opt_in() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("bridge.log");
    let config = write_config(
        &dir,
        &format!(
            "audit:\n  logPath: {}\n  logReadOnly: true\n",
            log_path.display()
        ),
    );
    let bridge = ManagementBridge::new(&config, handle()).unwrap();

    bridge.get_attribute(&name("mgmt:interface=public"), "mtu").unwrap();
    bridge.describe(&name("mgmt:interface=public")).unwrap();

    let operations: Vec<String> = bridge
        .audit()
        .unwrap()
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.operation)
        .collect();
    assert_eq!(operations, vec!["get-attribute", "describe"]);
}

#[test]
fn test_read_only_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "writable: false\n");
    let bridge = ManagementBridge::new(&config, handle()).unwrap();
    let public = name("mgmt:interface=public");

    assert!(matches!(
        bridge.set_attribute(&public, "mtu", &OpenValue::Long(9000)),
        Err(BridgeError::AttributeNotWritable(_))
    ));
    let descriptor = bridge.describe(&public).unwrap();
    assert!(descriptor.attributes.iter().all(|a| !a.writable));
    assert!(descriptor.operation("restart").is_none());
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.yaml");
    fs::write(&path, "legacyDomain: \"bad:domain\"\n").unwrap();
    assert!(matches!(BridgeConfig::load(&path), Err(BridgeError::Config(_))));

    assert!(matches!(
        BridgeConfig::load(dir.path().join("missing.yaml")),
        Err(BridgeError::Config(_))
    ));
}
