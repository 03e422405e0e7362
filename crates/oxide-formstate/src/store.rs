//! Field store.
//!
//! Field records live in a [`FieldState`], an immutable snapshot that shares
//! its map behind an [`Arc`]. Every change goes through [`reduce`], which
//! copies the map only when an older snapshot still holds it, so anyone
//! holding a snapshot never observes a later write.

use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ValidationError;
use crate::rules::RuleSpec;
use crate::schema::ValueMap;

/// One registered form field.
#[derive(Debug, Clone)]
pub struct FieldRecord {
    /// Field name, unique within a form.
    pub name: String,
    /// Current value.
    pub value: Value,
    /// Declared rules in declaration order.
    pub rules: Vec<RuleSpec>,
    /// Outcome of the last validation; `false` until the field is validated.
    pub is_valid: bool,
    /// Errors of the last validation, first declared failing rule first.
    pub errors: Vec<ValidationError>,
}

impl FieldRecord {
    /// Creates a record that has not been validated yet.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value, rules: Vec<RuleSpec>) -> Self {
        Self {
            name: name.into(),
            value,
            rules,
            is_valid: false,
            errors: Vec::new(),
        }
    }

    /// Returns the message that should be displayed for this field.
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }
}

/// A partial update merged into an existing record.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub value: Option<Value>,
    pub rules: Option<Vec<RuleSpec>>,
    pub is_valid: Option<bool>,
    pub errors: Option<Vec<ValidationError>>,
}

impl FieldPatch {
    /// A patch that only replaces the value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// A patch that records a validation outcome.
    #[must_use]
    pub fn validity(is_valid: bool, errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: Some(is_valid),
            errors: Some(errors),
            ..Self::default()
        }
    }

    fn apply(self, record: &mut FieldRecord) {
        if let Some(value) = self.value {
            record.value = value;
        }
        if let Some(rules) = self.rules {
            record.rules = rules;
        }
        if let Some(is_valid) = self.is_valid {
            record.is_valid = is_valid;
        }
        if let Some(errors) = self.errors {
            record.errors = errors;
        }
    }
}

/// A change to the field store.
#[derive(Debug, Clone)]
pub enum FieldAction {
    /// Inserts or replaces the whole record.
    Add { name: String, record: FieldRecord },
    /// Merges a patch into an existing record. Ignored for unknown names.
    Update { name: String, patch: FieldPatch },
    /// Removes a record. Ignored for unknown names.
    Remove { name: String },
}

/// An immutable snapshot of every registered field.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    fields: Arc<HashMap<String, FieldRecord>>,
}

impl FieldState {
    /// Returns the record for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.get(name)
    }

    /// Returns whether a field is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns the number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether no field is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the registered records.
    pub fn iter(&self) -> hash_map::Iter<'_, String, FieldRecord> {
        self.fields.iter()
    }

    /// Returns the current value of every field.
    #[must_use]
    pub fn values(&self) -> ValueMap {
        self.fields
            .iter()
            .map(|(name, record)| (name.clone(), record.value.clone()))
            .collect()
    }

    /// Returns whether two snapshots share the same underlying map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl<'a> IntoIterator for &'a FieldState {
    type Item = (&'a String, &'a FieldRecord);
    type IntoIter = hash_map::Iter<'a, String, FieldRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Applies an action to a snapshot and reports whether anything changed.
///
/// The map is copied only while another snapshot still shares it.
#[must_use]
pub fn reduce(mut state: FieldState, action: FieldAction) -> (FieldState, bool) {
    let changed = match action {
        FieldAction::Add { name, record } => {
            Arc::make_mut(&mut state.fields).insert(name, record);
            true
        }
        FieldAction::Update { name, patch } => {
            if state.fields.contains_key(&name) {
                if let Some(record) = Arc::make_mut(&mut state.fields).get_mut(&name) {
                    patch.apply(record);
                }
                true
            } else {
                debug!(field = %name, "dropping update for unregistered field");
                false
            }
        }
        FieldAction::Remove { name } => {
            if state.fields.contains_key(&name) {
                Arc::make_mut(&mut state.fields).remove(&name);
                true
            } else {
                false
            }
        }
    };
    (state, changed)
}

/// The field store owned by one form.
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    state: FieldState,
    version: u64,
}

impl FieldStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an action. Returns whether the store changed.
    pub fn dispatch(&mut self, action: FieldAction) -> bool {
        let (next, changed) = reduce(std::mem::take(&mut self.state), action);
        self.state = next;
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Inserts or replaces a field record.
    pub fn add_field(&mut self, name: impl Into<String>, record: FieldRecord) {
        let name = name.into();
        debug!(field = %name, "registering field");
        self.dispatch(FieldAction::Add { name, record });
    }

    /// Merges a patch into a registered field. Returns `false` if the
    /// field is not registered.
    pub fn update_field(&mut self, name: impl Into<String>, patch: FieldPatch) -> bool {
        self.dispatch(FieldAction::Update {
            name: name.into(),
            patch,
        })
    }

    /// Removes a field. Returns `false` if the field is not registered.
    pub fn remove_field(&mut self, name: impl Into<String>) -> bool {
        self.dispatch(FieldAction::Remove { name: name.into() })
    }

    /// Returns the record for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldRecord> {
        self.state.get(name)
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FieldState {
        self.state.clone()
    }

    /// Returns a counter bumped by every effective change.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use serde_json::json;

    fn record(name: &str, value: Value) -> FieldRecord {
        FieldRecord::new(name, value, vec![Rule::new().required().into()])
    }

    #[test]
    fn test_add_overwrites() {
        let mut store = FieldStore::new();
        store.add_field("user", record("user", json!("a")));
        store.add_field("user", FieldRecord::new("user", json!("b"), Vec::new()));

        let field = store.get("user").unwrap();
        assert_eq!(field.value, json!("b"));
        assert!(field.rules.is_empty());
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_update_merges() {
        let mut store = FieldStore::new();
        store.add_field("user", record("user", json!("a")));

        assert!(store.update_field("user", FieldPatch::value(json!("b"))));
        let field = store.get("user").unwrap();
        assert_eq!(field.value, json!("b"));
        assert_eq!(field.rules.len(), 1);
        assert!(!field.is_valid);
    }

    #[test]
    fn test_update_unknown_is_noop() {
        let mut store = FieldStore::new();
        assert!(!store.update_field("ghost", FieldPatch::value(json!("x"))));
        assert!(store.get("ghost").is_none());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut store = FieldStore::new();
        store.add_field("user", record("user", json!("a")));
        let before = store.snapshot();

        store.update_field("user", FieldPatch::validity(true, Vec::new()));

        assert!(!before.get("user").unwrap().is_valid);
        assert!(store.get("user").unwrap().is_valid);
        assert!(!before.ptr_eq(&store.snapshot()));
    }

    #[test]
    fn test_remove() {
        let mut store = FieldStore::new();
        store.add_field("user", record("user", json!("a")));
        assert!(store.remove_field("user"));
        assert!(!store.remove_field("user"));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_values() {
        let mut store = FieldStore::new();
        store.add_field("a", record("a", json!(1)));
        store.add_field("b", record("b", json!("two")));

        let values = store.snapshot().values();
        assert_eq!(values.get("a"), Some(&json!(1)));
        assert_eq!(values.get("b"), Some(&json!("two")));
    }
}
