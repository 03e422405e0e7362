//! Tests for field registration and updates.

mod common;
use common::*;

use oxide_formstate::{FieldPatch, FieldRecord, FieldStore, Rule};
use serde_json::json;

#[test]
fn test_add_field_twice_keeps_second_record() {
    let form = controller();
    register(&form, required_field("user", json!("first")));
    form.add_field(
        "user",
        FieldRecord::new(
            "user",
            json!("second"),
            vec![Rule::new().min(2).into(), Rule::new().max(8).into()],
        ),
    )
    .unwrap();

    let record = form.field("user").unwrap().unwrap();
    assert_eq!(record.name, "user");
    assert_eq!(record.value, json!("second"));
    assert_eq!(record.rules.len(), 2);
    assert!(!record.is_valid);
    assert!(record.errors.is_empty());
    assert_eq!(form.fields().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_field_replaces_validation_outcome() {
    let form = controller();
    register(&form, required_field("user", json!("")));
    form.validate_field("user").await.unwrap();
    assert_eq!(form.field("user").unwrap().unwrap().errors.len(), 1);

    register(&form, required_field("user", json!("")));
    assert!(form.field("user").unwrap().unwrap().errors.is_empty());
}

#[test]
fn test_update_unregistered_field_is_noop() {
    let form = controller();
    register(&form, required_field("user", json!("a")));

    let patch = FieldPatch::value(json!("x"));
    let changed = form.update_field("nonexistent", patch).unwrap();

    assert!(!changed);
    assert!(form.field("nonexistent").unwrap().is_none());
    assert_eq!(form.fields().unwrap().len(), 1);
}

#[test]
fn test_update_keeps_unpatched_parts() {
    let form = controller();
    register(&form, required_field("user", json!("a")));
    let validity = FieldPatch::validity(true, Vec::new());
    assert!(form.update_field("user", validity).unwrap());
    let value = FieldPatch::value(json!("b"));
    assert!(form.update_field("user", value).unwrap());

    let record = form.field("user").unwrap().unwrap();
    assert_eq!(record.value, json!("b"));
    assert!(record.is_valid);
    assert_eq!(record.rules.len(), 1);
}

#[test]
fn test_snapshots_do_not_see_later_writes() {
    let mut store = FieldStore::new();
    store.add_field("user", required_field("user", json!("a")));
    let snapshot = store.snapshot();

    store.update_field("user", FieldPatch::value(json!("b")));
    store.add_field("other", required_field("other", json!("")));

    assert_eq!(snapshot.get("user").unwrap().value, json!("a"));
    assert!(!snapshot.contains("other"));
    assert_eq!(store.snapshot().len(), 2);
}
