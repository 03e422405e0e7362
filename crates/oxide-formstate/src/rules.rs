//! Field rules.
//!
//! A field declares an ordered list of [`RuleSpec`]s. Static rules are plain
//! [`Rule`] values; dynamic rules are functions that receive the form's
//! [`FormFuncs`] and build a [`Rule`] right before each validation pass, which
//! is how one field's rules can depend on another field's current value.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::controller::FormFuncs;
use crate::error::FormError;

/// A boxed future returned by async validators.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A synchronous custom validator. `Err` carries the failure message.
pub type SyncValidatorFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// An asynchronous custom validator. `Err` carries the failure message.
pub type AsyncValidatorFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// A rule built from the form's live state at validation time.
pub type DynamicRuleFn = Arc<dyn Fn(&FormFuncs) -> Rule + Send + Sync>;

/// Value types the schema validator can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    String,
    Number,
    Boolean,
    Integer,
    Float,
    Array,
    Object,
    Email,
    Url,
    Enum,
}

impl RuleType {
    /// Returns the lowercase name used in messages and definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Array => "array",
            Self::Object => "object",
            Self::Email => "email",
            Self::Url => "url",
            Self::Enum => "enum",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "array" => Self::Array,
            "object" => Self::Object,
            "email" => Self::Email,
            "url" => Self::Url,
            "enum" => Self::Enum,
            other => return Err(FormError::UnknownRuleType(other.to_string())),
        })
    }
}

/// A declarative constraint on a single field value.
///
/// Every check set on one rule is evaluated in a fixed order and the rule
/// reports at most one error: the first check that fails.
#[derive(Clone, Default)]
pub struct Rule {
    /// The value must not be empty.
    pub required: bool,
    /// Expected value type.
    pub kind: Option<RuleType>,
    /// Minimum length (strings, arrays) or value (numbers).
    pub min: Option<f64>,
    /// Maximum length (strings, arrays) or value (numbers).
    pub max: Option<f64>,
    /// Exact length (strings, arrays) or value (numbers).
    pub len: Option<f64>,
    /// Pattern string values must match.
    pub pattern: Option<Regex>,
    /// Treat whitespace-only strings as empty.
    pub whitespace: bool,
    /// Allowed values.
    pub one_of: Option<Vec<Value>>,
    /// Message replacing the built-in one when a check fails.
    pub message: Option<String>,
    /// Custom synchronous check.
    pub validator: Option<SyncValidatorFn>,
    /// Custom asynchronous check.
    pub async_validator: Option<AsyncValidatorFn>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("required", &self.required)
            .field("kind", &self.kind)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("len", &self.len)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("whitespace", &self.whitespace)
            .field("one_of", &self.one_of)
            .field("message", &self.message)
            .field("validator", &self.validator.is_some())
            .field("async_validator", &self.async_validator.is_some())
            .finish()
    }
}

impl Rule {
    /// Creates an empty rule that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the value as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the expected value type.
    #[must_use]
    pub const fn kind(mut self, kind: RuleType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the minimum length or value.
    #[must_use]
    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Sets the maximum length or value.
    #[must_use]
    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Sets both bounds.
    #[must_use]
    pub fn range(self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.min(min).max(max)
    }

    /// Sets the exact length or value.
    #[must_use]
    pub fn exact_len(mut self, len: impl Into<f64>) -> Self {
        self.len = Some(len.into());
        self
    }

    /// Sets the pattern string values must match.
    #[must_use]
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Treats whitespace-only strings as empty.
    #[must_use]
    pub const fn whitespace(mut self) -> Self {
        self.whitespace = true;
        self
    }

    /// Restricts the value to a set of allowed values.
    #[must_use]
    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.one_of = Some(values.into_iter().collect());
        self
    }

    /// Sets the message reported when this rule fails.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a custom synchronous check.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Adds a custom asynchronous check.
    #[must_use]
    pub fn async_validator<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.async_validator = Some(Arc::new(move |value| Box::pin(validator(value))));
        self
    }
}

/// A rule as declared on a field.
#[derive(Clone)]
pub enum RuleSpec {
    /// A fixed rule.
    Static(Rule),
    /// A rule computed from the form's live state before each pass.
    Dynamic(DynamicRuleFn),
}

impl RuleSpec {
    /// Wraps a function as a dynamic rule.
    #[must_use]
    pub fn dynamic<F>(build: F) -> Self
    where
        F: Fn(&FormFuncs) -> Rule + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(build))
    }

    /// Returns whether this rule is computed at validation time.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

impl From<Rule> for RuleSpec {
    fn from(rule: Rule) -> Self {
        Self::Static(rule)
    }
}

impl fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(rule) => f.debug_tuple("Static").field(rule).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
