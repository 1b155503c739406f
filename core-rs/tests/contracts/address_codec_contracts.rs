// Address Codec Contract Tests
//
// These tests pin the path <-> name mapping external tools depend on.
// Names are persisted in monitoring configs and scripts, so a change in
// escaping or root naming silently breaks every stored reference.
//
// **Problem**: escaping tweaks that look harmless change existing names
// **Solution**: round-trip properties plus fixed golden names

use indexmap::IndexMap;
use model_bridge::naming::{escape_key, quote_value, unescape_key, unquote_value};
use model_bridge::{AddressCodec, ExternalName, InMemoryKernel, ResourcePath};
use proptest::prelude::*;

fn tree_with(path: &ResourcePath) -> InMemoryKernel {
    let kernel = InMemoryKernel::new();
    let mut prefix = ResourcePath::root();
    for element in path.iter() {
        prefix = prefix.append(element.clone());
        kernel.insert_resource(prefix.clone(), IndexMap::new()).unwrap();
    }
    kernel
}

// Keys never carry '%': "%x3a" in a raw key would read back as ':'
fn arb_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.:=*?,-]{0,6}"
}

fn arb_value() -> impl Strategy<Value = String> {
    "[ -~\n]{0,8}"
}

fn arb_path() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((arb_key(), arb_value()), 1..5).prop_filter("keys must be distinct", |pairs| {
        let mut keys: Vec<&String> = pairs.iter().map(|(k, _)| k).collect();
        keys.sort();
        keys.dedup();
        keys.len() == pairs.len()
    })
}

proptest! {
    /// WHY: Every resource reachable in the tree must be addressable by its encoded name
    /// REASON: External callers only ever hold the name, never the path
    /// BREAKS: Resources whose keys or values contain name syntax become unreachable
    #[test]
    fn encoded_name_decodes_to_original_path(pairs in arb_path()) {
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let path = ResourcePath::from_pairs(&refs);
        let tree = tree_with(&path);
        let codec = AddressCodec::new("mgmt");

        let name = codec.encode(&path).unwrap();
        let reparsed = ExternalName::parse(&name.to_string()).unwrap();
        prop_assert_eq!(&reparsed, &name);
        prop_assert_eq!(codec.decode(&reparsed, &tree), Some(path));
    }

    /// WHY: Key escaping is reversible for keys without '%'
    /// REASON: Decoding compares unescaped keys with child types in the tree
    /// BREAKS: Child types named with ':' or '=' stop resolving
    #[test]
    fn key_escaping_round_trips(key in arb_key()) {
        let escaped = escape_key(&key);
        prop_assert!(!escaped.contains([':', '*', '?', ',', '=']));
        prop_assert_eq!(unescape_key(&escaped), key);
    }

    /// WHY: Value quoting is reversible for any printable value
    /// REASON: Instance names are user supplied and may hold anything
    /// BREAKS: Resources like deployment="a,b.war" get wrong names
    #[test]
    fn value_quoting_round_trips(value in arb_value()) {
        prop_assert_eq!(unquote_value(&quote_value(&value)), value);
    }
}

/// WHY: The golden name of a two-level path must never change
/// REASON: Names are stored outside the process (dashboards, scripts)
/// BREAKS: Every stored reference to a nested resource
#[test]
fn nested_path_has_stable_name() {
    let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    let tree = tree_with(&path);
    let codec = AddressCodec::new("domain");

    let name = codec.encode(&path).unwrap();
    assert_eq!(name.to_string(), "domain:subsystem=net,binding=http");
    assert_eq!(codec.decode(&name, &tree), Some(path.clone()));

    let reordered = ExternalName::parse("domain:binding=http,subsystem=net").unwrap();
    assert_eq!(codec.decode(&reordered, &tree), Some(path));
}

/// WHY: A name with no matching resource must not decode
/// REASON: Callers distinguish "unknown name" from "known but inaccessible"
/// BREAKS: Calls against removed resources reach the kernel with a bogus path
#[test]
fn missing_resource_does_not_decode() {
    let path = ResourcePath::from_pairs(&[("subsystem", "net"), ("binding", "http")]);
    let tree = tree_with(&path);
    let codec = AddressCodec::new("domain");

    let missing = ExternalName::parse("domain:subsystem=net,binding=missing").unwrap();
    assert_eq!(codec.decode(&missing, &tree), None);

    let other_domain = ExternalName::parse("other:subsystem=net,binding=http").unwrap();
    assert_eq!(codec.decode(&other_domain, &tree), None);
}

/// WHY: The empty path has one reserved name
/// REASON: The root has no properties of its own but a name needs at least one
/// BREAKS: Server-level attributes become unreachable
#[test]
fn root_has_reserved_name() {
    let codec = AddressCodec::new("domain");
    let root = codec.encode(&ResourcePath::root()).unwrap();
    assert_eq!(root.to_string(), "domain:management-root=server");
    assert_eq!(codec.decode(&root, &InMemoryKernel::new()), Some(ResourcePath::root()));
}

/// WHY: Reserved characters are escaped with fixed tokens
/// REASON: Escaped keys appear verbatim in stored names
/// BREAKS: Stored names of resources with reserved characters in keys
#[test]
fn reserved_key_characters_use_hex_tokens() {
    let path = ResourcePath::from_pairs(&[("a:b", "x,y")]);
    let name = AddressCodec::new("d").encode(&path).unwrap();
    assert_eq!(name.to_string(), "d:a%x3ab=\"x,y\"");
}
