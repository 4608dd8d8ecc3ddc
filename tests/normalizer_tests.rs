// Copyright 2025 Cowboy AI, LLC.

//! Configuration normalization as seen through host construction

use cim_composite::{
    Attributes, ChildKind, ChildType, CompositeError, CompositeModel, ModelClass, ModelOptions,
    RecordListType, RecordType,
};
use serde_json::{json, Value};
use std::sync::Arc;
use test_case::test_case;

fn class() -> Arc<ModelClass> {
    ModelClass::builder("CompositeModel")
        .register(ChildType::entity(RecordType::new("TestModel")))
        .register(ChildType::collection(RecordListType::new(
            "TestCollection",
            RecordType::new("TestModel"),
        )))
        .parser("identity", |_, value, _| Ok(value))
        .build()
}

fn build(config: Value) -> Result<CompositeModel, CompositeError> {
    CompositeModel::new(&class(), Attributes::new(), ModelOptions::new().composite(config))
}

#[test_case(json!({"submodel": 1}) => matches CompositeError::InvalidDescriptor { .. } ; "number descriptor")]
#[test_case(json!({"submodel": {}}) => matches CompositeError::MissingChildType { .. } ; "missing type")]
#[test_case(json!({"submodel": {"type": 1}}) => matches CompositeError::UnknownChildType { .. } ; "numeric type")]
#[test_case(json!({"submodel": "Unregistered"}) => matches CompositeError::UnknownChildType { .. } ; "unregistered type")]
#[test_case(json!({"submodel": {"type": "TestModel", "parse": 1}}) => matches CompositeError::InvalidParseFunction { .. } ; "numeric parse")]
#[test_case(json!({"submodel": {"type": "TestModel", "parse": "missing"}}) => matches CompositeError::InvalidParseFunction { .. } ; "unregistered parse")]
#[test_case(json!({"submodel": {"type": "TestModel", "method": "dummy"}}) => matches CompositeError::UnknownUpdateMethod { .. } ; "unknown entity method")]
#[test_case(json!({"items": {"type": "TestCollection", "method": "replace"}}) => matches CompositeError::UnknownUpdateMethod { .. } ; "entity method on collection")]
#[test_case(json!({"fetch": "TestModel"}) => matches CompositeError::PropertyConflict { .. } ; "shadows fetch")]
#[test_case(json!({"a": {"type": "TestModel", "property": "to_json"}}) => matches CompositeError::PropertyConflict { .. } ; "renamed onto member")]
#[test_case(json!({"a": "TestModel", "b": {"type": "TestModel", "property": "a"}}) => matches CompositeError::DuplicateProperty { .. } ; "duplicate property")]
#[test_case(json!({"submodel": {"type": "TestModel", "options": 1}}) => matches CompositeError::InvalidDescriptor { .. } ; "non-object options")]
#[test_case(json!(["TestModel"]) => matches CompositeError::InvalidConfiguration { .. } ; "array configuration")]
fn test_rejects_configuration(config: Value) -> CompositeError {
    let err = build(config).unwrap_err();
    assert!(err.is_config_error());
    err
}

#[test]
fn test_empty_names_fall_back_to_defaults() {
    let model = build(json!({
        "submodel": {"type": "TestModel", "property": "", "method": ""}
    }))
    .unwrap();

    let descriptor = model.composite_map().get("submodel").unwrap();
    assert_eq!(descriptor.property, "submodel");
    assert_eq!(descriptor.method, "set");
}

#[test]
fn test_null_configuration_is_absent() {
    let model = build(Value::Null).unwrap();
    assert!(model.composite_map().is_empty());
}

#[test]
fn test_describe_reports_canonical_descriptors() {
    let model = build(json!({
        "owner": "TestModel",
        "items": {
            "type": "TestCollection",
            "property": "members",
            "method": "reset",
            "parse": "identity",
            "options": {"sort": true}
        }
    }))
    .unwrap();

    let map = model.composite_map();
    assert_eq!(map.attributes().collect::<Vec<_>>(), vec!["owner", "items"]);
    assert_eq!(map.by_property("members").map(|d| d.kind()), Some(ChildKind::Collection));

    let described = serde_json::to_value(map.describe()).unwrap();
    assert_eq!(
        described,
        json!({
            "owner": {
                "kind": "entity",
                "type": "TestModel",
                "property": "owner",
                "method": "set",
                "options": {}
            },
            "items": {
                "kind": "collection",
                "type": "TestCollection",
                "property": "members",
                "method": "reset",
                "options": {"sort": true},
                "parse": "identity"
            }
        })
    );
}

#[test]
fn test_instance_entries_override_class_entries_in_place() {
    let class = ModelClass::builder("Ordered")
        .register(ChildType::entity(RecordType::new("TestModel")))
        .register(ChildType::entity(RecordType::new("OtherModel")))
        .composite(json!({"first": "TestModel", "second": "TestModel"}))
        .build();

    let model = CompositeModel::new(
        &class,
        Attributes::new(),
        ModelOptions::new().composite(json!({"first": "OtherModel", "third": "TestModel"})),
    )
    .unwrap();

    let map = model.composite_map();
    assert_eq!(map.attributes().collect::<Vec<_>>(), vec!["first", "second", "third"]);
    assert_eq!(map.get("first").map(|d| d.child_type.type_name()), Some("OtherModel"));
}
