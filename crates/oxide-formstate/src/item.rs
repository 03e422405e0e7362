//! Form items: the registration contract between a form and its fields.
//!
//! A [`FormItem`] registers its field when mounted, forwards value changes
//! to the store, validates on its configured trigger and exposes what a
//! renderer needs (required marker, displayed error).

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::controller::FormController;
use crate::error::{Result, ValidationError};
use crate::resolver::resolve;
use crate::rules::RuleSpec;
use crate::store::{FieldPatch, FieldRecord};

/// Input events a form item reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    OnChange,
    OnBlur,
}

/// Configuration of one form item.
#[derive(Debug, Clone)]
pub struct FormItemProps {
    /// Field name, unique within the form.
    pub name: String,
    /// Label shown next to the control.
    pub label: Option<String>,
    /// Declared rules.
    pub rules: Vec<RuleSpec>,
    /// Event that carries a new value.
    pub trigger: Trigger,
    /// Event that triggers validation.
    pub validate_trigger: Trigger,
}

impl FormItemProps {
    /// Creates props with values on change and validation on blur.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            rules: Vec::new(),
            trigger: Trigger::OnChange,
            validate_trigger: Trigger::OnBlur,
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: impl Into<RuleSpec>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// Sets the value event.
    #[must_use]
    pub const fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Sets the validation event.
    #[must_use]
    pub const fn validate_trigger(mut self, trigger: Trigger) -> Self {
        self.validate_trigger = trigger;
        self
    }
}

/// A mounted field bound to a form.
#[derive(Debug)]
pub struct FormItem {
    props: FormItemProps,
    form: FormController,
}

impl FormItem {
    /// Registers the field with `form`.
    ///
    /// The initial value comes from the form's initial values, or is the
    /// empty string. Mounting a name twice replaces the earlier record.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn mount(form: &FormController, props: FormItemProps) -> Result<Self> {
        let value = form
            .initial_value(&props.name)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        form.add_field(
            props.name.clone(),
            FieldRecord::new(props.name.clone(), value, props.rules.clone()),
        )?;
        Ok(Self {
            props,
            form: form.clone(),
        })
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.props.name
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.props.label.as_deref()
    }

    /// Returns the item configuration.
    #[must_use]
    pub const fn props(&self) -> &FormItemProps {
        &self.props
    }

    /// Returns the current value, or the empty string once unregistered.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn value(&self) -> Result<Value> {
        Ok(self
            .form
            .get_field_value(&self.props.name)?
            .unwrap_or_else(|| Value::String(String::new())))
    }

    /// Handles an input event.
    ///
    /// On the value event, `value` is stored and the field validates if the
    /// value event is also the validation event. On the validation event
    /// alone, the field validates with its current value.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub async fn handle_event(&self, event: Trigger, value: Option<Value>) -> Result<()> {
        if event == self.props.trigger {
            if let Some(value) = value {
                self.form
                    .update_field(&self.props.name, FieldPatch::value(value))?;
            }
            if self.props.trigger == self.props.validate_trigger {
                self.form.validate_field(&self.props.name).await?;
            }
        } else if event == self.props.validate_trigger {
            self.form.validate_field(&self.props.name).await?;
        }
        Ok(())
    }

    /// Handles a change carrying a new value.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub async fn handle_change(&self, value: Value) -> Result<()> {
        self.handle_event(Trigger::OnChange, Some(value)).await
    }

    /// Handles the control losing focus.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub async fn handle_blur(&self) -> Result<()> {
        self.handle_event(Trigger::OnBlur, None).await
    }

    /// Returns whether any rule, static or resolved, is `required`.
    ///
    /// Dynamic rules are resolved with read-only capabilities, so asking
    /// never queues a validation.
    #[must_use]
    pub fn is_required(&self) -> bool {
        resolve(&self.props.rules, &self.form.funcs())
            .iter()
            .any(|rule| rule.required)
    }

    /// Returns the errors of the last validation.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn errors(&self) -> Result<Vec<ValidationError>> {
        Ok(self
            .form
            .field(&self.props.name)?
            .map_or_else(Vec::new, |record| record.errors))
    }

    /// Returns whether the field currently has errors.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn has_error(&self) -> Result<bool> {
        Ok(!self.errors()?.is_empty())
    }

    /// Returns the message to display: the first error only.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn error_message(&self) -> Result<Option<String>> {
        Ok(self.errors()?.into_iter().next().map(|e| e.message))
    }

    /// Unregisters the field.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn unmount(self) -> Result<()> {
        self.form.remove_field(&self.props.name)?;
        Ok(())
    }
}

/// Picks the control a form item wraps.
///
/// An item wraps exactly one control. With none, an error is logged and
/// nothing is returned; with several, a warning is logged and the first one
/// is used.
#[must_use]
pub fn select_control<C>(field: &str, children: Vec<C>) -> Option<C> {
    if children.is_empty() {
        error!(field, "form item has no control");
        return None;
    }
    if children.len() > 1 {
        warn!(
            field,
            ignored = children.len() - 1,
            "form item wraps more than one control, using the first"
        );
    }
    children.into_iter().next()
}
