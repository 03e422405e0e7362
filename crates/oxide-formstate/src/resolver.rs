//! Turns declared rules into concrete rules for one validation pass.

use crate::controller::FormFuncs;
use crate::rules::{Rule, RuleSpec};

/// Resolves declared rules against the form's current state.
///
/// Dynamic rules are invoked with `funcs` and replaced by the rule they
/// return; static rules pass through. The output keeps declaration order.
/// Call this once per pass: dynamic rules read live field values, so a
/// resolved list must not be reused for a later pass.
#[must_use]
pub fn resolve(rules: &[RuleSpec], funcs: &FormFuncs) -> Vec<Rule> {
    rules
        .iter()
        .map(|spec| match spec {
            RuleSpec::Static(rule) => rule.clone(),
            RuleSpec::Dynamic(build) => build(funcs),
        })
        .collect()
}
