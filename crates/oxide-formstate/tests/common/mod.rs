#![allow(dead_code)]

use std::sync::Arc;

use oxide_formstate::{
    FieldRecord, Form, FormController, FormItem, FormItemProps, FormOptions, Rule, RuleSpec,
};
use regex::Regex;
use serde_json::{Value, json};
use tokio::sync::Notify;

pub const PASSWORD_MISMATCH: &str = "密码不相等";

pub fn controller() -> FormController {
    FormController::new(FormOptions::default())
}

/// Registers `record` under its own name.
pub fn register(form: &FormController, record: FieldRecord) {
    form.add_field(record.name.clone(), record).unwrap();
}

pub fn required_field(name: &str, value: Value) -> FieldRecord {
    FieldRecord::new(
        name,
        value,
        vec![Rule::new().required().message(format!("{name} is required")).into()],
    )
}

/// A rule that compares the value with the live value of `password`.
pub fn matches_password() -> RuleSpec {
    RuleSpec::dynamic(|funcs| {
        let password = funcs.get_field_value("password").unwrap_or(Value::Null);
        Rule::new().validator(move |value| {
            if *value == password {
                Ok(())
            } else {
                Err(PASSWORD_MISMATCH.to_string())
            }
        })
    })
}

/// A rule that asks the form to re-validate `confirm-pwd`.
pub fn revalidates_confirm() -> RuleSpec {
    RuleSpec::dynamic(|funcs| {
        let funcs = funcs.clone();
        Rule::new().async_validator(move |_| {
            funcs.validate_field("confirm-pwd");
            async { Ok(()) }
        })
    })
}

/// Mounts the login fields: `userName`, `password` and optionally
/// `confirm-pwd`.
pub fn mount_login(form: &Form, with_confirm: bool) -> Vec<FormItem> {
    let pattern = Regex::new(r"^[a-zA-Z0-9]{6,16}$").unwrap();
    let mut items = vec![
        form.item(
            FormItemProps::new("userName")
                .label("User name")
                .rule(Rule::new().required().message("please enter a user name"))
                .rule(Rule::new().range(6, 16).message("6 to 16 characters")),
        )
        .unwrap(),
        form.item(
            FormItemProps::new("password")
                .label("Password")
                .rule(Rule::new().required().message("please enter a password"))
                .rule(Rule::new().pattern(pattern).message("6 to 16 letters or digits"))
                .rule(revalidates_confirm()),
        )
        .unwrap(),
    ];
    if with_confirm {
        items.push(
            form.item(
                FormItemProps::new("confirm-pwd")
                    .label("Confirm password")
                    .rule(Rule::new().required().message("please confirm the password"))
                    .rule(matches_password()),
            )
            .unwrap(),
        );
    }
    items
}

/// Two notifications that let a test hold an async validator open.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule whose async validator waits for [`Gate::open`] when the value
    /// equals `gated`, failing with `message` once released.
    pub fn rule(&self, gated: Value, message: &str) -> Rule {
        self.hold(gated, Err(message.to_string()))
    }

    /// Like [`Gate::rule`], but the held value passes once released.
    pub fn delay(&self, gated: Value) -> Rule {
        self.hold(gated, Ok(()))
    }

    fn hold(&self, gated: Value, outcome: Result<(), String>) -> Rule {
        let gate = self.clone();
        Rule::new().async_validator(move |value| {
            let gate = gate.clone();
            let outcome = outcome.clone();
            let gated = gated.clone();
            async move {
                if value != gated {
                    return Ok(());
                }
                gate.started.notify_one();
                gate.release.notified().await;
                outcome
            }
        })
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

pub fn slow() -> Value {
    json!("slow")
}
