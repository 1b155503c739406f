// Type Conversion Contract Tests
//
// These tests verify that values survive the trip out to external callers
// and back. A caller that reads an attribute and writes the same value back
// must leave the model unchanged, in either conversion domain.
//
// **Problem**: a lossy converter turns read-modify-write clients into corruptors
// **Solution**: decode(encode(v)) == v for every shape the model uses

use indexmap::IndexMap;
use model_bridge::convert::{OpenType, SimpleType};
use model_bridge::model::{FieldDescriptor, TypeDescriptor, ValueType};
use model_bridge::naming::{camel_to_kebab, kebab_to_camel};
use model_bridge::{OpenValue, TypeConverters, Value, ValueKind};
use proptest::prelude::*;

fn td(kind: ValueKind) -> TypeDescriptor {
    TypeDescriptor::new(kind)
}

fn all_converters() -> Vec<TypeConverters> {
    vec![
        TypeConverters::legacy(true),
        TypeConverters::legacy(false),
        TypeConverters::expression_aware(),
    ]
}

// Plain text that cannot be mistaken for an expression
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._/-]{0,12}"
}

fn arb_simple() -> impl Strategy<Value = (ValueKind, Value)> {
    prop_oneof![
        any::<bool>().prop_map(|b| (ValueKind::Boolean, Value::Boolean(b))),
        any::<i64>().prop_map(|i| (ValueKind::Int64, Value::Int64(i))),
        arb_text().prop_map(|s| (ValueKind::String, Value::String(s))),
        "-?[1-9][0-9]{0,30}".prop_map(|s| (ValueKind::BigInteger, Value::BigInteger(s))),
        "-?[0-9]{1,10}\\.[0-9]{1,10}".prop_map(|s| (ValueKind::BigDecimal, Value::BigDecimal(s))),
    ]
}

fn record_type() -> TypeDescriptor {
    let mut fields = IndexMap::new();
    fields.insert("host".to_string(), FieldDescriptor::new("Host name", td(ValueKind::String)));
    fields.insert("port".to_string(), FieldDescriptor::new("Port", td(ValueKind::Int64)));
    fields.insert("secure".to_string(), FieldDescriptor::new("TLS", td(ValueKind::Boolean)));
    TypeDescriptor::with_value_type(ValueKind::Object, ValueType::Complex(fields))
}

proptest! {
    /// WHY: Simple values must read back exactly as written
    /// REASON: Clients read, tweak and write whole attribute sets
    /// BREAKS: Writing back an unchanged value would alter the model
    #[test]
    fn simple_values_round_trip((kind, value) in arb_simple()) {
        for converters in all_converters() {
            let encoded = converters.encode(&td(kind), &value).unwrap();
            prop_assert!(encoded.conforms_to(&converters.describe(&td(kind))));
            prop_assert_eq!(converters.decode(&td(kind), &encoded).unwrap(), value.clone());
        }
    }

    /// WHY: Lists keep order and element values
    /// REASON: Ordered lists like interceptor chains are order-sensitive
    /// BREAKS: Read-modify-write of a list reorders it
    #[test]
    fn lists_round_trip(items in prop::collection::vec(any::<i64>(), 0..8)) {
        let list_td = TypeDescriptor::with_value_type(ValueKind::List, ValueType::Simple(ValueKind::Int64));
        let value = Value::List(items.into_iter().map(Value::Int64).collect());
        for converters in all_converters() {
            let encoded = converters.encode(&list_td, &value).unwrap();
            prop_assert_eq!(converters.decode(&list_td, &encoded).unwrap(), value.clone());
        }
    }

    /// WHY: Maps become tables and come back as the same map
    /// REASON: Property maps are edited by clients as tables
    /// BREAKS: Keys dropped or values retyped on write-back
    #[test]
    fn maps_round_trip(entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..6)) {
        let map_td = TypeDescriptor::with_value_type(ValueKind::Object, ValueType::Simple(ValueKind::Int64));
        let value = Value::Object(entries.into_iter().map(|(k, v)| (k, Value::Int64(v))).collect());
        let converters = TypeConverters::legacy(true);
        let encoded = converters.encode(&map_td, &value).unwrap();
        prop_assert!(matches!(encoded, OpenValue::Tabular(_)));
        prop_assert_eq!(converters.decode(&map_td, &encoded).unwrap(), value);
    }

    /// WHY: Complex records with every field defined round trip
    /// REASON: Records are exposed as composites with one item per field
    /// BREAKS: Field values swapped or lost between composite and object
    #[test]
    fn records_round_trip(host in arb_text(), port in 0i64..65536, secure in any::<bool>()) {
        let value = Value::object([
            ("host", Value::String(host)),
            ("port", Value::Int64(port)),
            ("secure", Value::Boolean(secure)),
        ]);
        for converters in all_converters() {
            let encoded = converters.encode(&record_type(), &value).unwrap();
            prop_assert_eq!(converters.decode(&record_type(), &encoded).unwrap(), value.clone());
        }
    }

    /// WHY: Expressions stay unresolved through the expression-aware domain
    /// REASON: Tools editing configuration must see and keep ${...} placeholders
    /// BREAKS: Reading and writing back an attribute hardcodes its resolved value
    #[test]
    fn expressions_survive_expression_domain(name in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}", default in 0i64..100000) {
        let converters = TypeConverters::expression_aware();
        let expression = Value::Expression(format!("${{{}:{}}}", name, default));
        let encoded = converters.encode(&td(ValueKind::Int64), &expression).unwrap();
        prop_assert_eq!(&encoded, &OpenValue::String(format!("${{{}:{}}}", name, default)));
        prop_assert_eq!(converters.decode(&td(ValueKind::Int64), &encoded).unwrap(), expression);
    }

    /// WHY: kebab -> camel -> kebab is the identity for plain lowercase words
    /// REASON: Attribute and operation lookups convert the external name back
    /// BREAKS: camelCase attribute names stop resolving
    #[test]
    fn case_conversion_round_trips(word in "[a-z]{1,6}(-[a-z]{1,6}){0,3}") {
        prop_assert_eq!(camel_to_kebab(&kebab_to_camel(&word)), word);
    }

    /// WHY: camel -> kebab -> camel is the identity without digits or consecutive capitals
    /// REASON: External names of attributes and operations are derived back from kebab names
    /// BREAKS: A leading capital such as `Port` is lost and the name no longer resolves
    #[test]
    fn camel_names_survive_kebab_conversion(word in "([A-Z]?[a-z]){1,8}[A-Z]?") {
        prop_assert_eq!(kebab_to_camel(&camel_to_kebab(&word)), word);
    }
}

/// WHY: The legacy domain exposes natural types, the expression domain strings
/// REASON: Existing monitoring clients expect a Long for INT64 attributes
/// BREAKS: Dashboards graphing numeric attributes
#[test]
fn domains_expose_different_types() {
    let int64 = td(ValueKind::Int64);
    assert_eq!(
        TypeConverters::legacy(true).describe(&int64),
        OpenType::Simple(SimpleType::Long)
    );
    assert_eq!(TypeConverters::expression_aware().describe(&int64), OpenType::string());
}

/// WHY: Undefined and null map onto each other
/// REASON: Unset attributes must read as null, and writing null clears them
/// BREAKS: Clearing an attribute from a client
#[test]
fn undefined_maps_to_null() {
    for converters in all_converters() {
        assert_eq!(converters.encode(&td(ValueKind::Int64), &Value::Undefined).unwrap(), OpenValue::Null);
        assert_eq!(converters.decode(&td(ValueKind::Int64), &OpenValue::Null).unwrap(), Value::Undefined);
    }
}

/// WHY: Maps preserve key order as well as content
/// REASON: Tables are shown to users in model order
/// BREAKS: Stable display of map attributes
#[test]
fn map_keeps_model_order() {
    let map_td = TypeDescriptor::with_value_type(ValueKind::Object, ValueType::Simple(ValueKind::String));
    let value = Value::object([("zeta", Value::string("1")), ("alpha", Value::string("2"))]);
    let converters = TypeConverters::legacy(true);
    let decoded = converters
        .decode(&map_td, &converters.encode(&map_td, &value).unwrap())
        .unwrap();
    let keys: Vec<&String> = match &decoded {
        Value::Object(map) => map.keys().collect(),
        other => panic!("Expected an object, got {:?}", other),
    };
    assert_eq!(keys, vec!["zeta", "alpha"]);
}
