//! Declarative form definitions.
//!
//! A form can be described in JSON and turned into a [`Form`] with its
//! mounted [`FormItem`]s. Besides the static checks of [`Rule`], two
//! cross-field rules are available declaratively:
//!
//! - `sameAs`: the value must equal another field's current value.
//! - `revalidate`: validating this field also re-validates the listed fields.
//!
//! ```rust
//! use oxide_formstate::definition::FormDefinition;
//!
//! let definition = FormDefinition::from_json(r#"{
//!     "name": "login",
//!     "fields": [
//!         { "name": "password", "rules": [{ "required": true }, { "revalidate": ["confirm"] }] },
//!         { "name": "confirm", "rules": [{ "sameAs": "password", "message": "must match" }] }
//!     ]
//! }"#).unwrap();
//!
//! let (form, items) = definition.build().unwrap();
//! assert_eq!(form.name(), Some("login"));
//! assert_eq!(items.len(), 2);
//! ```

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::controller::FormOptions;
use crate::error::{FormError, Result};
use crate::form::Form;
use crate::item::{FormItem, FormItemProps, Trigger};
use crate::rules::{Rule, RuleSpec, RuleType};
use crate::schema::ValueMap;

/// A whole form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub initial_values: ValueMap,
    pub fields: Vec<FieldDefinition>,
}

/// One field of a form definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub validate_trigger: Option<Trigger>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// One rule of a field definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleDefinition {
    pub required: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub len: Option<f64>,
    pub pattern: Option<String>,
    pub whitespace: bool,
    #[serde(rename = "enum")]
    pub one_of: Option<Vec<Value>>,
    pub message: Option<String>,
    /// Name of a field whose current value this field must equal.
    pub same_as: Option<String>,
    /// Fields to re-validate whenever this rule runs.
    pub revalidate: Vec<String>,
}

impl FormDefinition {
    /// Parses a definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Definition`] if the JSON does not describe a form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the form options of this definition.
    #[must_use]
    pub fn options(&self) -> FormOptions {
        FormOptions {
            name: self.name.clone(),
            initial_values: self.initial_values.clone(),
        }
    }

    /// Returns the definition of a field.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownField`] if no field has that name.
    pub fn field(&self, name: &str) -> Result<&FieldDefinition> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    /// Creates the form and mounts one item per field, in order.
    ///
    /// # Errors
    ///
    /// Fails if a rule is invalid or the form state lock is poisoned.
    pub fn build(&self) -> Result<(Form, Vec<FormItem>)> {
        let form = Form::new(self.options());
        let items = self
            .fields
            .iter()
            .map(|field| form.item(field.props()?))
            .collect::<Result<Vec<_>>>()?;
        Ok((form, items))
    }
}

impl FieldDefinition {
    /// Converts the definition to item props.
    ///
    /// # Errors
    ///
    /// Fails if a rule has an unknown type or an invalid pattern.
    pub fn props(&self) -> Result<FormItemProps> {
        let mut props = FormItemProps::new(&self.name);
        if let Some(label) = &self.label {
            props = props.label(label);
        }
        if let Some(trigger) = self.trigger {
            props = props.trigger(trigger);
        }
        if let Some(trigger) = self.validate_trigger {
            props = props.validate_trigger(trigger);
        }
        for rule in &self.rules {
            props = props.rule(rule.to_spec(&self.name)?);
        }
        Ok(props)
    }
}

impl RuleDefinition {
    /// Builds the rule for `field`. Cross-field parts make it dynamic.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownRuleType`] or [`FormError::InvalidPattern`].
    pub fn to_spec(&self, field: &str) -> Result<RuleSpec> {
        let base = self.static_rule(field)?;
        if self.same_as.is_none() && self.revalidate.is_empty() {
            return Ok(RuleSpec::Static(base));
        }

        let same_as = self.same_as.clone();
        let revalidate = self.revalidate.clone();
        let mismatch = self.message.clone().unwrap_or_else(|| {
            same_as.as_ref().map_or_else(
                || format!("{field} fails"),
                |other| format!("{field} must match {other}"),
            )
        });

        Ok(RuleSpec::dynamic(move |funcs| {
            let mut rule = base.clone();
            if let Some(other) = &same_as {
                let expected = funcs.get_field_value(other).unwrap_or(Value::Null);
                let mismatch = mismatch.clone();
                rule = rule.validator(move |value| {
                    if *value == expected {
                        Ok(())
                    } else {
                        Err(mismatch.clone())
                    }
                });
            }
            if !revalidate.is_empty() {
                let funcs = funcs.clone();
                let targets = revalidate.clone();
                rule = rule.async_validator(move |_| {
                    for target in &targets {
                        funcs.validate_field(target);
                    }
                    async { Ok(()) }
                });
            }
            rule
        }))
    }

    fn static_rule(&self, field: &str) -> Result<Rule> {
        let mut rule = Rule::new();
        rule.required = self.required;
        rule.kind = self
            .kind
            .as_deref()
            .map(str::parse::<RuleType>)
            .transpose()?;
        rule.min = self.min;
        rule.max = self.max;
        rule.len = self.len;
        rule.whitespace = self.whitespace;
        rule.one_of = self.one_of.clone();
        rule.message = self.message.clone();
        if let Some(pattern) = &self.pattern {
            let pattern = Regex::new(pattern).map_err(|source| FormError::InvalidPattern {
                field: field.to_string(),
                source,
            })?;
            rule = rule.pattern(pattern);
        }
        Ok(rule)
    }
}
