//! Error types for form state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Form-specific errors.
///
/// A field failing its rules is not one of these: validation outcomes travel
/// as [`ValidationError`] data on the field records and in [`FieldErrors`].
#[derive(Debug, Error)]
pub enum FormError {
    /// An internal lock was poisoned by a panicking writer.
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),

    /// A rule pattern did not compile.
    #[error("invalid pattern for field {field}: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A rule definition named a type the schema validator does not know.
    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    /// No field with this name exists in the definition or the store.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A form definition could not be parsed.
    #[error("failed to parse form definition: {0}")]
    Definition(#[from] serde_json::Error),
}

/// Result type alias for form operations.
pub type Result<T> = std::result::Result<T, FormError>;

/// A single rule violation reported for a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Human readable message.
    pub message: String,
    /// Name of the field that failed.
    pub field: String,
    /// The value that was validated.
    pub field_value: Value,
    /// Position of the failing rule in the field's resolved rule list.
    pub rule_index: usize,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        field_value: Value,
        rule_index: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
            field_value,
            rule_index,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collection of validation errors by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    /// Errors keyed by field name.
    pub errors: BTreeMap<String, Vec<ValidationError>>,
}

impl FieldErrors {
    /// Creates a new empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }

    /// Adds an error for its field.
    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    /// Returns whether there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns errors for a specific field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Vec<ValidationError>> {
        self.errors.get(field)
    }

    /// Returns whether a field has at least one error.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|e| !e.is_empty())
    }

    /// Returns the message that would be displayed for a field.
    ///
    /// Only the first error of a field is ever shown.
    #[must_use]
    pub fn first_message(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|errors| errors.first())
            .map(|e| e.message.as_str())
    }

    /// Returns all errors as a flat list.
    #[must_use]
    pub fn all_errors(&self) -> Vec<&ValidationError> {
        self.errors.values().flatten().collect()
    }

    /// Iterates over field names and their errors.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationError])> {
        self.errors
            .iter()
            .map(|(field, errors)| (field.as_str(), errors.as_slice()))
    }
}

impl FromIterator<ValidationError> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        let mut errors = Self::new();
        for error in iter {
            errors.add(error);
        }
        errors
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in self.all_errors() {
            writeln!(f, "{error}")?;
        }
        Ok(())
    }
}
