//! # oxide-formstate
//!
//! Form state and validation: field registration, declarative and
//! cross-field rules, and async validation passes.
//!
//! This crate provides:
//! - A per-form field store with copy-on-write snapshots
//! - Static rules and rules computed from the current form values
//! - A validation engine with sync and async custom validators
//! - Form and form item types that wire triggers to validation
//!
//! ## Quick Start
//!
//! ```rust
//! use oxide_formstate::{Form, FormItemProps, FormOptions, Rule, SubmitOutcome};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let form = Form::new(FormOptions::named("login"))
//!     .on_finish(|values| println!("submitted {values:?}"));
//!
//! let user = form
//!     .item(
//!         FormItemProps::new("userName")
//!             .rule(Rule::new().required().message("enter a user name"))
//!             .rule(Rule::new().range(6, 16)),
//!     )
//!     .unwrap();
//!
//! user.handle_change(json!("ada_lovelace")).await.unwrap();
//! assert_eq!(form.handle_submit().await.unwrap(), SubmitOutcome::Finished);
//! # });
//! ```
//!
//! ## Cross-field rules
//!
//! A dynamic rule is rebuilt before every validation with access to the
//! other fields through [`FormFuncs`]:
//!
//! ```rust
//! use oxide_formstate::{Rule, RuleSpec};
//! use serde_json::Value;
//!
//! let confirm = RuleSpec::dynamic(|funcs| {
//!     let password = funcs.get_field_value("password").unwrap_or(Value::Null);
//!     Rule::new().validator(move |value| {
//!         if *value == password {
//!             Ok(())
//!         } else {
//!             Err("passwords differ".to_string())
//!         }
//!     })
//! });
//! assert!(confirm.is_dynamic());
//! ```
//!
//! Forms can also be loaded from JSON, see [`definition`].

pub mod controller;
pub mod definition;
mod error;
pub mod form;
pub mod item;
pub mod resolver;
pub mod rules;
pub mod schema;
pub mod store;

pub use controller::{
    FormController, FormFuncs, FormOptions, FormState, SubmitOutcome, ValidateResult,
};
pub use definition::FormDefinition;
pub use error::{FieldErrors, FormError, Result, ValidationError};
pub use form::Form;
pub use item::{FormItem, FormItemProps, Trigger, select_control};
pub use resolver::resolve;
pub use rules::{Rule, RuleSpec, RuleType};
pub use schema::{Schema, SchemaError, ValueMap};
pub use store::{FieldPatch, FieldRecord, FieldStore};
