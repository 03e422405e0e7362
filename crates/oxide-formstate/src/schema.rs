//! Schema validator.
//!
//! Validates a map of field values against a map of field rules. Failure is
//! reported through [`SchemaError`], which carries both the flat error list
//! and the same errors grouped by field.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::error::ValidationError;
use crate::rules::{Rule, RuleType};

/// Rules keyed by field name.
pub type RuleMap = BTreeMap<String, Vec<Rule>>;

/// Values keyed by field name.
pub type ValueMap = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

static EMAIL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

/// Validation failure for one schema pass.
#[derive(Debug, Clone, Error)]
#[error("{} field(s) failed validation", .fields.len())]
pub struct SchemaError {
    /// Every error, grouped by field in field-name order.
    pub errors: Vec<ValidationError>,
    /// Errors keyed by field name. Fields without errors are absent.
    pub fields: BTreeMap<String, Vec<ValidationError>>,
}

/// A set of field rules that can validate value maps.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: RuleMap,
}

impl Schema {
    /// Creates a schema from a rule map.
    #[must_use]
    pub const fn new(rules: RuleMap) -> Self {
        Self { rules }
    }

    /// Creates a schema covering a single field.
    #[must_use]
    pub fn single(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        let mut map = RuleMap::new();
        map.insert(name.into(), rules);
        Self::new(map)
    }

    /// Returns the rule map.
    #[must_use]
    pub const fn rules(&self) -> &RuleMap {
        &self.rules
    }

    /// Validates `values` against every field in the schema.
    ///
    /// Fields are checked concurrently. A field missing from `values` is
    /// validated as `null`.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] listing every failed rule if any field fails.
    pub async fn validate(&self, values: &ValueMap) -> Result<(), SchemaError> {
        let checks = self.rules.iter().map(|(name, rules)| {
            validate_field(name, rules, values.get(name).unwrap_or(&NULL))
        });

        let mut fields = BTreeMap::new();
        for (name, errors) in self.rules.keys().zip(join_all(checks).await) {
            if !errors.is_empty() {
                fields.insert(name.clone(), errors);
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            let errors = fields.values().flatten().cloned().collect();
            Err(SchemaError { errors, fields })
        }
    }
}

async fn validate_field(name: &str, rules: &[Rule], value: &Value) -> Vec<ValidationError> {
    let checks = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| check_rule(name, index, rule, value));
    join_all(checks).await.into_iter().flatten().collect()
}

async fn check_rule(
    field: &str,
    index: usize,
    rule: &Rule,
    value: &Value,
) -> Option<ValidationError> {
    let fail = |message: String| Some(ValidationError::new(field, value.clone(), index, message));

    if let Some(message) = builtin_failure(field, rule, value) {
        return fail(rule.message.clone().unwrap_or(message));
    }

    if let Some(validator) = &rule.validator {
        if let Err(message) = validator(value) {
            return fail(custom_message(field, rule, message));
        }
    }

    if let Some(validator) = &rule.async_validator {
        if let Err(message) = validator(value.clone()).await {
            return fail(custom_message(field, rule, message));
        }
    }

    None
}

fn custom_message(field: &str, rule: &Rule, message: String) -> String {
    if !message.is_empty() {
        return message;
    }
    rule.message
        .clone()
        .unwrap_or_else(|| format!("{field} fails"))
}

/// Returns whether a value counts as "not filled in".
#[must_use]
pub const fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Runs the declarative checks of a rule and returns the default message
/// of the first one that fails.
fn builtin_failure(field: &str, rule: &Rule, value: &Value) -> Option<String> {
    let blank = rule.whitespace && value.as_str().is_some_and(|s| s.trim().is_empty());
    if blank || is_empty_value(value) {
        return rule.required.then(|| format!("{field} is required"));
    }

    if let Some(kind) = rule.kind {
        if !matches_type(kind, rule, value) {
            return Some(format!("{field} is not a valid {kind}"));
        }
    }

    if let Some(message) = range_failure(field, rule, value) {
        return Some(message);
    }

    if let (Some(pattern), Some(s)) = (&rule.pattern, value.as_str()) {
        if !pattern.is_match(s) {
            return Some(format!(
                "{field} value {s} does not match pattern {}",
                pattern.as_str()
            ));
        }
    }

    if let Some(allowed) = &rule.one_of {
        if !allowed.contains(value) {
            let list = allowed
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Some(format!("{field} must be one of {list}"));
        }
    }

    None
}

fn matches_type(kind: RuleType, rule: &Rule, value: &Value) -> bool {
    match kind {
        RuleType::String => value.is_string(),
        RuleType::Number => value.is_number(),
        RuleType::Boolean => value.is_boolean(),
        RuleType::Integer => value.as_f64().is_some_and(|n| n.fract() == 0.0),
        RuleType::Float => value.as_f64().is_some_and(|n| n.fract() != 0.0),
        RuleType::Array => value.is_array(),
        RuleType::Object => value.is_object(),
        RuleType::Email => value.as_str().is_some_and(|s| {
            EMAIL_REGEX
                .as_ref()
                .is_some_and(|regex| regex.is_match(s))
        }),
        RuleType::Url => value
            .as_str()
            .is_some_and(|s| s.starts_with("http://") || s.starts_with("https://")),
        RuleType::Enum => rule
            .one_of
            .as_ref()
            .is_some_and(|allowed| allowed.contains(value)),
    }
}

#[derive(Clone, Copy)]
enum Measure {
    Chars,
    Number,
    Items,
}

#[allow(clippy::float_cmp)]
fn range_failure(field: &str, rule: &Rule, value: &Value) -> Option<String> {
    if rule.len.is_none() && rule.min.is_none() && rule.max.is_none() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let (measured, measure) = match value {
        Value::String(s) => (s.chars().count() as f64, Measure::Chars),
        Value::Number(n) => (n.as_f64()?, Measure::Number),
        Value::Array(items) => (items.len() as f64, Measure::Items),
        _ => return None,
    };

    let message = match (rule.len, rule.min, rule.max) {
        (Some(len), _, _) if measured != len => match measure {
            Measure::Chars => format!("{field} must be exactly {len} characters"),
            Measure::Number => format!("{field} must equal {len}"),
            Measure::Items => format!("{field} must be exactly {len} in length"),
        },
        (Some(_), _, _) => return None,
        (None, Some(min), None) if measured < min => match measure {
            Measure::Chars => format!("{field} must be at least {min} characters"),
            Measure::Number => format!("{field} cannot be less than {min}"),
            Measure::Items => format!("{field} cannot be less than {min} in length"),
        },
        (None, None, Some(max)) if measured > max => match measure {
            Measure::Chars => format!("{field} cannot be longer than {max} characters"),
            Measure::Number => format!("{field} cannot be greater than {max}"),
            Measure::Items => format!("{field} cannot be greater than {max} in length"),
        },
        (None, Some(min), Some(max)) if measured < min || measured > max => match measure {
            Measure::Chars => format!("{field} must be between {min} and {max} characters"),
            Measure::Number => format!("{field} must be between {min} and {max}"),
            Measure::Items => format!("{field} must be between {min} and {max} in length"),
        },
        _ => return None,
    };
    Some(message)
}
