//! Tests for single-field and whole-form validation.

mod common;
use common::*;

use oxide_formstate::{FieldRecord, Rule, SubmitOutcome};
use serde_json::json;

#[tokio::test]
async fn test_validate_one_round_trip() {
    let form = controller();
    register(&form, required_field("name", json!("")));

    form.validate_field("name").await.unwrap();
    let record = form.field("name").unwrap().unwrap();
    assert!(!record.is_valid);
    assert!(!record.errors.is_empty());
    assert_eq!(record.first_error(), Some("name is required"));

    form.set_field_value("name", json!("Ada")).unwrap();
    form.validate_field("name").await.unwrap();
    let record = form.field("name").unwrap().unwrap();
    assert!(record.is_valid);
    assert!(record.errors.is_empty());
}

#[tokio::test]
async fn test_cross_field_rule_reads_live_value() {
    let form = controller();
    register(&form, required_field("password", json!("abc123")));
    register(
        &form,
        FieldRecord::new("confirm", json!("abc123"), vec![matches_password()]),
    );

    form.validate_field("confirm").await.unwrap();
    assert!(form.field("confirm").unwrap().unwrap().is_valid);

    form.set_field_value("confirm", json!("xyz")).unwrap();
    form.validate_field("confirm").await.unwrap();
    let record = form.field("confirm").unwrap().unwrap();
    assert!(!record.is_valid);
    assert_eq!(record.first_error(), Some(PASSWORD_MISMATCH));

    form.set_field_value("password", json!("xyz")).unwrap();
    form.validate_field("confirm").await.unwrap();
    assert!(form.field("confirm").unwrap().unwrap().is_valid);
}

#[tokio::test]
async fn test_full_form_aggregates_invalid_fields() {
    let form = controller();
    register(&form, required_field("first", json!("")));
    register(
        &form,
        FieldRecord::new("second", json!("ab"), vec![Rule::new().min(3).into()]),
    );
    register(&form, required_field("third", json!("ok")));

    let result = form.validate_fields().await.unwrap();

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(
        result.errors.first_message("first"),
        Some("first is required")
    );
    assert_eq!(
        result.errors.first_message("second"),
        Some("second must be at least 3 characters")
    );
    assert!(!result.errors.contains("third"));
    assert_eq!(result.values.get("third"), Some(&json!("ok")));

    assert!(!form.field("first").unwrap().unwrap().is_valid);
    assert!(!form.field("second").unwrap().unwrap().is_valid);
    assert!(form.field("third").unwrap().unwrap().is_valid);

    let state = form.form_state().unwrap();
    assert!(!state.is_valid);
    assert_eq!(state.errors, result.errors);
}

#[tokio::test]
async fn test_all_failing_rules_are_reported_in_order() {
    let form = controller();
    register(
        &form,
        FieldRecord::new(
            "code",
            json!("abcd"),
            vec![
                Rule::new().exact_len(3).message("three characters").into(),
                Rule::new().validator(|_| Err("never valid".into())).into(),
            ],
        ),
    );

    form.validate_field("code").await.unwrap();
    let errors = form.field("code").unwrap().unwrap().errors;
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message, "three characters");
    assert_eq!(errors[0].rule_index, 0);
    assert_eq!(errors[1].message, "never valid");
    assert_eq!(errors[1].rule_index, 1);
    assert_eq!(errors[1].field_value, json!("abcd"));
}

#[tokio::test]
async fn test_submitting_flag_brackets_validation() {
    let gate = Gate::new();
    let form = controller();
    register(
        &form,
        FieldRecord::new("slow", slow(), vec![gate.rule(slow(), "rejected").into()]),
    );
    assert!(!form.form_state().unwrap().is_submitting);

    let task = tokio::spawn({
        let form = form.clone();
        async move { form.validate_fields().await }
    });
    gate.wait_started().await;
    assert!(form.form_state().unwrap().is_submitting);

    gate.open();
    let result = task.await.unwrap().unwrap();
    assert!(!result.is_valid);
    assert!(!form.form_state().unwrap().is_submitting);
}

#[tokio::test]
async fn test_submitting_flag_cleared_after_success() {
    let form = controller();
    register(&form, required_field("name", json!("Ada")));

    let result = form.validate_fields().await.unwrap();
    assert!(result.is_valid);
    assert!(!form.form_state().unwrap().is_submitting);
}

#[tokio::test]
async fn test_submitting_flag_cleared_when_validator_panics() {
    let form = controller();
    register(
        &form,
        FieldRecord::new(
            "name",
            json!("Ada"),
            vec![Rule::new().validator(|_| panic!("validator crashed")).into()],
        ),
    );

    let task = tokio::spawn({
        let form = form.clone();
        async move { form.validate_fields().await }
    });
    let err = task.await.unwrap_err();
    assert!(err.is_panic());

    let state = form.form_state().unwrap();
    assert!(!state.is_submitting);
    assert!(!form.field("name").unwrap().unwrap().is_valid);
}

#[tokio::test]
async fn test_submit_while_submitting_is_ignored() {
    let gate = Gate::new();
    let form = controller();
    register(
        &form,
        FieldRecord::new("slow", slow(), vec![gate.rule(slow(), "rejected").into()]),
    );

    let task = tokio::spawn({
        let form = form.clone();
        async move { form.submit(|_| {}, |_| {}).await }
    });
    gate.wait_started().await;

    let second = form
        .submit(|_| panic!("ignored"), |_| panic!("ignored"))
        .await
        .unwrap();
    assert_eq!(second, SubmitOutcome::Ignored);

    gate.open();
    assert_eq!(task.await.unwrap().unwrap(), SubmitOutcome::Failed);
    assert!(!form.form_state().unwrap().is_submitting);
}

#[tokio::test]
async fn test_last_started_validation_wins() {
    let gate = Gate::new();
    let form = controller();
    register(
        &form,
        FieldRecord::new("name", slow(), vec![gate.rule(slow(), "stale").into()]),
    );

    let first = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("name").await }
    });
    gate.wait_started().await;

    form.set_field_value("name", json!("fast")).unwrap();
    form.validate_field("name").await.unwrap();
    assert!(form.field("name").unwrap().unwrap().is_valid);

    gate.open();
    first.await.unwrap().unwrap();
    let record = form.field("name").unwrap().unwrap();
    assert!(record.is_valid);
    assert!(record.errors.is_empty());
}

#[tokio::test]
async fn test_result_for_removed_field_is_dropped() {
    let gate = Gate::new();
    let form = controller();
    register(
        &form,
        FieldRecord::new("name", slow(), vec![gate.rule(slow(), "late").into()]),
    );

    let task = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("name").await }
    });
    gate.wait_started().await;
    assert!(form.remove_field("name").unwrap());

    gate.open();
    task.await.unwrap().unwrap();
    assert!(form.field("name").unwrap().is_none());
    assert!(form.fields().unwrap().is_empty());
}

/// A full pass finishing first must not swallow the re-validation that a
/// concurrent single-field pass asked for.
#[tokio::test]
async fn test_revalidation_requests_stay_with_their_pass() {
    let full_gate = Gate::new();
    let password_gate = Gate::new();
    let form = controller();
    register(
        &form,
        FieldRecord::new("slow", slow(), vec![full_gate.rule(slow(), "rejected").into()]),
    );
    register(
        &form,
        FieldRecord::new(
            "password",
            json!("old"),
            vec![revalidates_confirm(), password_gate.delay(json!("new")).into()],
        ),
    );
    register(
        &form,
        FieldRecord::new("confirm-pwd", json!("new"), vec![matches_password()]),
    );

    let full = tokio::spawn({
        let form = form.clone();
        async move { form.validate_fields().await }
    });
    full_gate.wait_started().await;

    form.set_field_value("password", json!("new")).unwrap();
    let password = tokio::spawn({
        let form = form.clone();
        async move { form.validate_field("password").await }
    });
    password_gate.wait_started().await;

    full_gate.open();
    let result = full.await.unwrap().unwrap();
    assert_eq!(
        result.errors.first_message("confirm-pwd"),
        Some(PASSWORD_MISMATCH)
    );

    password_gate.open();
    password.await.unwrap().unwrap();
    let confirm = form.field("confirm-pwd").unwrap().unwrap();
    assert!(confirm.is_valid);
    assert!(confirm.errors.is_empty());
}
