//! Form controller.
//!
//! A [`FormController`] owns one form's field store and runs its validation
//! passes. It is cheap to clone; every clone drives the same form, which is
//! how a form hands its state down to the items it contains.
//!
//! Concurrency rules:
//! - Each validation pass takes a ticket per field. A result is written only
//!   if its ticket is still the newest for that field, so when two passes
//!   race on one field the one started last wins.
//! - Results for fields that were removed while the pass ran are dropped.
//! - [`FormFuncs::validate_field`] called from inside a rule is queued on
//!   the pass that resolved the rule and runs once that pass has finished.
//!   Passes never see each other's requests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{FieldErrors, FormError, Result};
use crate::resolver::resolve;
use crate::schema::{RuleMap, Schema, ValueMap};
use crate::store::{FieldPatch, FieldRecord, FieldState, FieldStore};

/// Form-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    /// Form name, used in log events.
    pub name: Option<String>,
    /// Initial field values, used on registration and by
    /// [`FormController::reset_fields_value`].
    pub initial_values: ValueMap,
}

impl FormOptions {
    /// Creates options for a named form.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets an initial value.
    #[must_use]
    pub fn initial_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.initial_values.insert(name.into(), value);
        self
    }
}

/// Form-level validation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormState {
    /// Outcome of the last full validation.
    pub is_valid: bool,
    /// Whether a full validation is running.
    pub is_submitting: bool,
    /// Errors of the last full validation.
    pub errors: FieldErrors,
}

/// Result of validating every field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateResult {
    pub is_valid: bool,
    /// The values that were validated.
    pub values: ValueMap,
    /// Errors of the fields that failed. Valid fields are absent.
    pub errors: FieldErrors,
}

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every field passed; the finish callback ran.
    Finished,
    /// At least one field failed; the failure callback ran.
    Failed,
    /// Another submission was still running; nothing happened.
    Ignored,
}

/// Fields that rules asked to re-validate during one pass.
type Requests = Arc<Mutex<VecDeque<String>>>;

struct Shared {
    store: FieldStore,
    form: FormState,
    tickets: HashMap<String, u64>,
    last_ticket: u64,
    submitting: usize,
}

impl Shared {
    fn next_ticket(&mut self, name: &str) -> u64 {
        self.last_ticket += 1;
        self.tickets.insert(name.to_string(), self.last_ticket);
        self.last_ticket
    }

    /// Writes a validation outcome if `ticket` is still current for `name`.
    fn commit(&mut self, name: &str, ticket: u64, patch: FieldPatch) {
        if self.tickets.get(name) == Some(&ticket) {
            self.store.update_field(name, patch);
        } else {
            debug!(field = name, ticket, "discarding stale validation result");
        }
    }
}

struct FormInner {
    options: FormOptions,
    shared: RwLock<Shared>,
}

/// Handle to one form's fields and validation.
#[derive(Clone)]
pub struct FormController {
    inner: Arc<FormInner>,
}

impl fmt::Debug for FormController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormController")
            .field("name", &self.inner.options.name)
            .finish_non_exhaustive()
    }
}

impl FormController {
    /// Creates a controller with an empty field store.
    #[must_use]
    pub fn new(options: FormOptions) -> Self {
        Self {
            inner: Arc::new(FormInner {
                options,
                shared: RwLock::new(Shared {
                    store: FieldStore::new(),
                    form: FormState::default(),
                    tickets: HashMap::new(),
                    last_ticket: 0,
                    submitting: 0,
                }),
            }),
        }
    }

    /// Returns the form options.
    #[must_use]
    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    /// Returns the initial value configured for a field.
    #[must_use]
    pub fn initial_value(&self, name: &str) -> Option<&Value> {
        self.inner.options.initial_values.get(name)
    }

    /// Returns read-only capabilities for resolving rules outside a pass,
    /// e.g. to render a required marker.
    ///
    /// Reads see the live values. [`FormFuncs::validate_field`] on this
    /// handle does nothing.
    #[must_use]
    pub fn funcs(&self) -> FormFuncs {
        FormFuncs {
            inner: Arc::downgrade(&self.inner),
            requests: None,
        }
    }

    /// Capabilities for one pass: validation requests land in `requests`.
    fn pass_funcs(&self, requests: &Requests) -> FormFuncs {
        FormFuncs {
            inner: Arc::downgrade(&self.inner),
            requests: Some(Arc::clone(requests)),
        }
    }

    /// Registers a field, replacing any record with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn add_field(&self, name: impl Into<String>, record: FieldRecord) -> Result<()> {
        let name = name.into();
        let mut shared = write_lock(&self.inner.shared, "registering field")?;
        shared.tickets.remove(&name);
        shared.store.add_field(name, record);
        drop(shared);
        Ok(())
    }

    /// Merges a patch into a registered field.
    ///
    /// Returns `false` and changes nothing if the field is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn update_field(&self, name: &str, patch: FieldPatch) -> Result<bool> {
        Ok(write_lock(&self.inner.shared, "updating field")?
            .store
            .update_field(name, patch))
    }

    /// Unregisters a field. Validations still running for it are dropped
    /// when they finish.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn remove_field(&self, name: &str) -> Result<bool> {
        let mut shared = write_lock(&self.inner.shared, "removing field")?;
        shared.tickets.remove(name);
        Ok(shared.store.remove_field(name))
    }

    /// Returns a field's current value.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn get_field_value(&self, name: &str) -> Result<Option<Value>> {
        Ok(read_lock(&self.inner.shared, "reading field value")?
            .store
            .get(name)
            .map(|record| record.value.clone()))
    }

    /// Returns the current value of every field.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn get_fields_value(&self) -> Result<ValueMap> {
        Ok(read_lock(&self.inner.shared, "reading field values")?
            .store
            .snapshot()
            .values())
    }

    /// Sets a registered field's value without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn set_field_value(&self, name: &str, value: Value) -> Result<bool> {
        self.update_field(name, FieldPatch::value(value))
    }

    /// Restores the configured initial value of every registered field
    /// that has one.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn reset_fields_value(&self) -> Result<()> {
        for (name, value) in &self.inner.options.initial_values {
            self.set_field_value(name, value.clone())?;
        }
        Ok(())
    }

    /// Returns a copy of one field record.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn field(&self, name: &str) -> Result<Option<FieldRecord>> {
        Ok(read_lock(&self.inner.shared, "reading field")?
            .store
            .get(name)
            .cloned())
    }

    /// Returns a snapshot of every field record.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn fields(&self) -> Result<FieldState> {
        Ok(read_lock(&self.inner.shared, "reading fields")?
            .store
            .snapshot())
    }

    /// Returns the form-level state.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub fn form_state(&self) -> Result<FormState> {
        Ok(read_lock(&self.inner.shared, "reading form state")?
            .form
            .clone())
    }

    /// Validates one field and records the outcome on its record.
    ///
    /// Validation failures are written to the record, never returned. An
    /// unregistered name is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub async fn validate_field(&self, name: &str) -> Result<()> {
        let requests = Requests::default();
        self.run_field_validation(name, &requests).await?;
        let mut visited = HashSet::from([name.to_string()]);
        self.drain_requests(&requests, &mut visited).await
    }

    /// Validates every registered field in one schema pass.
    ///
    /// `is_submitting` is set for the duration of the call and cleared on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub async fn validate_fields(&self) -> Result<ValidateResult> {
        let guard = SubmittingGuard::begin(&self.inner)?;
        self.run_full_validation(guard).await
    }

    /// Validates every field, then runs exactly one of the callbacks.
    ///
    /// A submit received while another is still validating is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::StatePoisoned`] if the form state lock is poisoned.
    pub async fn submit<F, G>(&self, on_finish: F, on_finish_failed: G) -> Result<SubmitOutcome>
    where
        F: FnOnce(&ValueMap) + Send,
        G: FnOnce(&FieldErrors) + Send,
    {
        let Some(guard) = SubmittingGuard::begin_exclusive(&self.inner)? else {
            debug!(form = ?self.inner.options.name, "ignoring submit while submitting");
            return Ok(SubmitOutcome::Ignored);
        };

        let result = self.run_full_validation(guard).await?;
        if result.is_valid {
            on_finish(&result.values);
            Ok(SubmitOutcome::Finished)
        } else {
            on_finish_failed(&result.errors);
            Ok(SubmitOutcome::Failed)
        }
    }

    async fn run_field_validation(&self, name: &str, requests: &Requests) -> Result<()> {
        let (ticket, value, rules) = {
            let mut shared = write_lock(&self.inner.shared, "starting field validation")?;
            let Some(record) = shared.store.get(name) else {
                debug!(field = name, "skipping validation of unregistered field");
                return Ok(());
            };
            let value = record.value.clone();
            let rules = record.rules.clone();
            (shared.next_ticket(name), value, rules)
        };

        let schema = Schema::single(name, resolve(&rules, &self.pass_funcs(requests)));
        let values = ValueMap::from([(name.to_string(), value)]);
        let patch = schema.validate(&values).await.map_or_else(
            |err| FieldPatch::validity(false, err.errors),
            |()| FieldPatch::validity(true, Vec::new()),
        );

        write_lock(&self.inner.shared, "writing field validation result")?
            .commit(name, ticket, patch);
        Ok(())
    }

    async fn run_full_validation(&self, guard: SubmittingGuard) -> Result<ValidateResult> {
        let (snapshot, tickets) = {
            let mut shared = write_lock(&self.inner.shared, "starting form validation")?;
            let snapshot = shared.store.snapshot();
            let tickets: HashMap<String, u64> = snapshot
                .iter()
                .map(|(name, _)| (name.clone(), shared.next_ticket(name)))
                .collect();
            (snapshot, tickets)
        };

        let requests = Requests::default();
        let funcs = self.pass_funcs(&requests);
        let rules: RuleMap = snapshot
            .iter()
            .map(|(name, record)| (name.clone(), resolve(&record.rules, &funcs)))
            .collect();
        let values = snapshot.values();

        let errors = Schema::new(rules).validate(&values).await.map_or_else(
            |err| FieldErrors { errors: err.fields },
            |()| FieldErrors::new(),
        );
        let is_valid = errors.is_empty();
        debug!(
            form = ?self.inner.options.name,
            fields = snapshot.len(),
            failed = errors.len(),
            "form validation finished"
        );

        {
            let mut shared = write_lock(&self.inner.shared, "writing form validation result")?;
            for (name, record) in &snapshot {
                let patch = if let Some(field_errors) = errors.get(name) {
                    FieldPatch::validity(false, field_errors.clone())
                } else if record.rules.is_empty() {
                    continue;
                } else {
                    FieldPatch::validity(true, Vec::new())
                };
                if let Some(&ticket) = tickets.get(name) {
                    shared.commit(name, ticket, patch);
                }
            }
            shared.form.is_valid = is_valid;
            shared.form.errors = errors.clone();
        }
        drop(guard);

        let mut visited: HashSet<String> =
            snapshot.iter().map(|(name, _)| name.clone()).collect();
        self.drain_requests(&requests, &mut visited).await?;

        Ok(ValidateResult {
            is_valid,
            values,
            errors,
        })
    }

    /// Runs the validations rules requested during one pass. Each field runs
    /// at most once and never if it is already in `visited`. Requests made
    /// by these follow-up validations join the same queue.
    async fn drain_requests(
        &self,
        requests: &Requests,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        loop {
            let next = requests
                .lock()
                .map_err(|_| FormError::StatePoisoned("reading validation requests"))?
                .pop_front();
            let Some(name) = next else {
                return Ok(());
            };
            if visited.insert(name.clone()) {
                self.run_field_validation(&name, requests).await?;
            }
        }
    }
}

/// Keeps `is_submitting` set while alive.
struct SubmittingGuard {
    inner: Arc<FormInner>,
}

impl SubmittingGuard {
    /// Marks the form as submitting.
    fn begin(inner: &Arc<FormInner>) -> Result<Self> {
        let mut shared = write_lock(&inner.shared, "marking form as submitting")?;
        Ok(Self::mark(inner, &mut shared))
    }

    /// Marks the form as submitting unless a submission is already running.
    fn begin_exclusive(inner: &Arc<FormInner>) -> Result<Option<Self>> {
        let mut shared = write_lock(&inner.shared, "marking form as submitting")?;
        if shared.submitting > 0 {
            return Ok(None);
        }
        Ok(Some(Self::mark(inner, &mut shared)))
    }

    fn mark(inner: &Arc<FormInner>, shared: &mut Shared) -> Self {
        shared.submitting += 1;
        shared.form.is_submitting = true;
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        let mut shared = self
            .inner
            .shared
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        shared.submitting = shared.submitting.saturating_sub(1);
        shared.form.is_submitting = shared.submitting > 0;
    }
}

/// The form capabilities available to dynamic rules.
///
/// Holds a weak reference: once the form is dropped, reads return nothing
/// and validation requests are ignored.
#[derive(Clone)]
pub struct FormFuncs {
    inner: Weak<FormInner>,
    requests: Option<Requests>,
}

impl fmt::Debug for FormFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFuncs")
            .field("attached", &(self.inner.strong_count() > 0))
            .field("in_pass", &self.requests.is_some())
            .finish_non_exhaustive()
    }
}

impl FormFuncs {
    /// Returns another field's current value.
    #[must_use]
    pub fn get_field_value(&self, name: &str) -> Option<Value> {
        let inner = self.inner.upgrade()?;
        let shared = inner.shared.read().ok()?;
        shared.store.get(name).map(|record| record.value.clone())
    }

    /// Returns the current value of every field.
    #[must_use]
    pub fn get_fields_value(&self) -> ValueMap {
        let Some(inner) = self.inner.upgrade() else {
            return ValueMap::new();
        };
        let Ok(shared) = inner.shared.read() else {
            return ValueMap::new();
        };
        shared.store.snapshot().values()
    }

    /// Requests validation of another field once the pass that resolved
    /// this rule is done. Ignored outside a pass.
    pub fn validate_field(&self, name: &str) {
        let Some(requests) = &self.requests else {
            return;
        };
        if self.inner.strong_count() == 0 {
            return;
        }
        let Ok(mut queue) = requests.lock() else {
            return;
        };
        queue.push_back(name.to_string());
    }
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, context: &'static str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
