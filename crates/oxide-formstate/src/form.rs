//! The form: a controller plus the callbacks run on submission.

use std::fmt;

use crate::controller::{FormController, FormOptions, FormState, SubmitOutcome};
use crate::error::{FieldErrors, Result};
use crate::item::{FormItem, FormItemProps};
use crate::schema::ValueMap;

/// Called with the submitted values when every field passes.
pub type FinishCallback = Box<dyn Fn(&ValueMap) + Send + Sync>;

/// Called with the field errors when a submission fails validation.
pub type FinishFailedCallback = Box<dyn Fn(&FieldErrors) + Send + Sync>;

/// A form instance.
///
/// Owns exactly one [`FormController`]; items are mounted against it with
/// [`Form::item`].
pub struct Form {
    controller: FormController,
    on_finish: Option<FinishCallback>,
    on_finish_failed: Option<FinishFailedCallback>,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("controller", &self.controller)
            .field("on_finish", &self.on_finish.is_some())
            .field("on_finish_failed", &self.on_finish_failed.is_some())
            .finish()
    }
}

impl Form {
    /// Creates a form with an empty field store.
    #[must_use]
    pub fn new(options: FormOptions) -> Self {
        Self {
            controller: FormController::new(options),
            on_finish: None,
            on_finish_failed: None,
        }
    }

    /// Sets the callback for successful submissions.
    #[must_use]
    pub fn on_finish(mut self, callback: impl Fn(&ValueMap) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }

    /// Sets the callback for submissions that fail validation.
    #[must_use]
    pub fn on_finish_failed(
        mut self,
        callback: impl Fn(&FieldErrors) + Send + Sync + 'static,
    ) -> Self {
        self.on_finish_failed = Some(Box::new(callback));
        self
    }

    /// Returns the form name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.controller.options().name.as_deref()
    }

    /// Returns the controller shared with this form's items.
    #[must_use]
    pub const fn controller(&self) -> &FormController {
        &self.controller
    }

    /// Mounts an item on this form.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn item(&self, props: FormItemProps) -> Result<FormItem> {
        FormItem::mount(&self.controller, props)
    }

    /// Returns the form-level state, e.g. to show progress while
    /// `is_submitting`.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub fn state(&self) -> Result<FormState> {
        self.controller.form_state()
    }

    /// Validates every field and runs the matching callback.
    ///
    /// # Errors
    ///
    /// Fails if the form state lock is poisoned.
    pub async fn handle_submit(&self) -> Result<SubmitOutcome> {
        self.controller
            .submit(
                |values| {
                    if let Some(callback) = &self.on_finish {
                        callback(values);
                    }
                },
                |errors| {
                    if let Some(callback) = &self.on_finish_failed {
                        callback(errors);
                    }
                },
            )
            .await
    }
}
