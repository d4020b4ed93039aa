//! Evaluation of a request against one policy, or against the ordered set
//! of policies matching a credential.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map as CelMap};
use cel_interpreter::{Context, Program, Value as CelValue};

use crate::types::{CredentialRequest, Decision, Policy, PolicyEvalResult};

/// Evaluate a single `policy` against `request`.
///
/// Checks run in the exact order the authorization model requires; the
/// first failing check produces the result. `monthly_spending` is injected
/// by the caller (normally sourced from the audit log) rather than queried
/// here — the engine stays a pure function of its inputs.
pub fn evaluate(policy: &Policy, request: &CredentialRequest, monthly_spending: f64) -> PolicyEvalResult {
    // 1. Explicit deny.
    if policy.deny.iter().any(|denied| denied == &request.agent_id) {
        return PolicyEvalResult::deny(
            Some(&policy.name),
            format!("agent '{}' is explicitly denied by policy '{}'", request.agent_id, policy.name),
        );
    }

    // 2. Grant scope — agent.
    if let Some(selector) = &policy.grant_to.agent_id {
        if !selector.is_wildcard() && !selector.matches(&request.agent_id) {
            return PolicyEvalResult::deny(
                Some(&policy.name),
                format!(
                    "agent '{}' is not granted access under policy '{}'",
                    request.agent_id, policy.name
                ),
            );
        }
    }

    // 3. Grant scope — skill (only checked when the request supplies one).
    if let Some(requested_skill) = &request.skill_id {
        if let Some(selector) = &policy.grant_to.skill_id {
            if !selector.is_wildcard() && !selector.matches(requested_skill) {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!(
                        "skill '{}' is not granted access under policy '{}'",
                        requested_skill, policy.name
                    ),
                );
            }
        }
    }

    // 4. Actions.
    if let Some(allowed_actions) = &policy.actions {
        if let Some(action) = &request.action {
            if !allowed_actions.iter().any(|a| a == action) {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!("action '{action}' is not permitted by policy '{}'", policy.name),
                );
            }
        }
    }

    // 5. Per-transaction budget.
    if let (Some(budget), Some(amount)) = (&policy.budget, request.amount) {
        if let Some(limit) = budget.max_per_transaction {
            if amount > limit {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!("amount {amount} exceeds max per transaction {limit} under policy '{}'", policy.name),
                );
            }
        }
    }

    // 6. Monthly budget.
    if let (Some(budget), Some(amount)) = (&policy.budget, request.amount) {
        if let Some(limit) = budget.max_per_month {
            if monthly_spending + amount > limit {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!(
                        "monthly budget exceeded under policy '{}': {monthly_spending} + {amount} > {limit}",
                        policy.name
                    ),
                );
            }
        }
    }

    // 7. Approval threshold — terminal: a later, more permissive policy is
    // never consulted once this fires.
    if let (Some(threshold), Some(amount)) = (policy.approval_threshold, request.amount) {
        if amount > threshold {
            return PolicyEvalResult::require_approval(
                &policy.name,
                format!("amount {amount} exceeds approval threshold {threshold} under policy '{}'", policy.name),
                policy.scope.clone(),
            );
        }
    }

    // 8. Condition expression.
    if let Some(condition) = &policy.condition {
        match evaluate_condition(condition, request) {
            Ok(true) => {}
            Ok(false) => {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!("CEL condition '{condition}' was not satisfied under policy '{}'", policy.name),
                );
            }
            Err(reason) => {
                return PolicyEvalResult::deny(
                    Some(&policy.name),
                    format!("CEL condition error under policy '{}': {reason}", policy.name),
                );
            }
        }
    }

    // 9. All checks passed.
    tracing::debug!(policy = %policy.name, agent_id = %request.agent_id, "policy allowed request");
    PolicyEvalResult::allow(&policy.name, policy.scope.clone())
}

/// Select the first applicable decision among the policies governing
/// `request.credential_name`, in document order (a *priority* order):
/// the first `allow` or `require_approval` wins; if every candidate
/// denies, the last denial is returned.
pub fn evaluate_first(policies: &[&Policy], request: &CredentialRequest, monthly_spending: f64) -> PolicyEvalResult {
    let candidates: Vec<&&Policy> = policies
        .iter()
        .filter(|p| p.credential == request.credential_name)
        .collect();

    if candidates.is_empty() {
        return PolicyEvalResult::deny(
            None,
            format!("No policy found for credential '{}'", request.credential_name),
        );
    }

    let mut last_denial = None;
    for policy in candidates {
        let result = evaluate(policy, request, monthly_spending);
        match result.decision {
            Decision::Allow | Decision::RequireApproval => return result,
            Decision::Deny => last_denial = Some(result),
        }
    }

    last_denial.expect("at least one candidate was evaluated")
}

fn evaluate_condition(expression: &str, request: &CredentialRequest) -> Result<bool, String> {
    let program = Program::compile(expression).map_err(|e| e.to_string())?;
    let mut context = Context::default();

    context
        .add_variable("agent_id", request.agent_id.clone())
        .map_err(|e| e.to_string())?;
    context
        .add_variable("skill_id", request.skill_id.clone().unwrap_or_default())
        .map_err(|e| e.to_string())?;
    context
        .add_variable("purpose", request.purpose.clone())
        .map_err(|e| e.to_string())?;
    context
        .add_variable("amount", request.amount.unwrap_or(0.0))
        .map_err(|e| e.to_string())?;
    context
        .add_variable("currency", request.currency.clone().unwrap_or_default())
        .map_err(|e| e.to_string())?;
    context
        .add_variable("action", request.action.clone().unwrap_or_default())
        .map_err(|e| e.to_string())?;

    for (key, value) in &request.context {
        context
            .add_variable(key.clone(), json_to_cel(value))
            .map_err(|e| e.to_string())?;
    }

    let result = program.execute(&context).map_err(|e| e.to_string())?;
    match result {
        CelValue::Bool(b) => Ok(b),
        other => Err(format!("condition did not evaluate to a boolean (got {other:?})")),
    }
}

/// Bridge a JSON value from `request.context` into a CEL value. The
/// condition language only ever sees these request fields — never vault or
/// audit data.
fn json_to_cel(value: &serde_json::Value) -> CelValue {
    match value {
        serde_json::Value::Null => CelValue::Null,
        serde_json::Value::Bool(b) => CelValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else {
                CelValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => CelValue::String(Arc::new(s.clone())),
        serde_json::Value::Array(items) => {
            CelValue::List(Arc::new(items.iter().map(json_to_cel).collect()))
        }
        serde_json::Value::Object(obj) => {
            let mut map = HashMap::new();
            for (k, v) in obj {
                map.insert(Key::String(Arc::new(k.clone())), json_to_cel(v));
            }
            CelValue::Map(CelMap { map: Arc::new(map) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Budget, GrantTo, ScopeSelector};

    fn base_policy() -> Policy {
        Policy {
            name: "stripe-charge".to_string(),
            description: None,
            credential: "stripe-key".to_string(),
            grant_to: GrantTo {
                agent_id: Some(ScopeSelector::One("test-agent".to_string())),
                skill_id: None,
            },
            deny: vec![],
            actions: Some(vec!["charge".to_string()]),
            budget: Some(Budget {
                max_per_transaction: Some(100.0),
                max_per_month: Some(500.0),
                currency: Some("USD".to_string()),
            }),
            approval_threshold: Some(75.0),
            condition: None,
            scope: Default::default(),
            ttl: 60,
        }
    }

    fn base_request() -> CredentialRequest {
        CredentialRequest {
            credential_name: "stripe-key".to_string(),
            agent_id: "test-agent".to_string(),
            skill_id: None,
            purpose: "charge customer".to_string(),
            amount: Some(25.0),
            currency: None,
            action: Some("charge".to_string()),
            context: Default::default(),
        }
    }

    #[test]
    fn happy_path_allows() {
        let result = evaluate(&base_policy(), &base_request(), 0.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn unauthorized_agent_is_denied() {
        let mut request = base_request();
        request.agent_id = "unauthorized-agent".to_string();

        let result = evaluate(&base_policy(), &request, 0.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert!(result.reason.contains("not granted"));
    }

    #[test]
    fn amount_above_threshold_requires_approval() {
        let mut request = base_request();
        request.amount = Some(80.0);

        let result = evaluate(&base_policy(), &request, 0.0);
        assert!(matches!(result.decision, Decision::RequireApproval));
        assert!(result.reason.contains("approval threshold"));
    }

    #[test]
    fn amount_equal_to_threshold_is_allowed() {
        let mut request = base_request();
        request.amount = Some(75.0);

        let result = evaluate(&base_policy(), &request, 0.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn amount_above_per_transaction_cap_is_denied() {
        let mut request = base_request();
        request.amount = Some(150.0);

        let result = evaluate(&base_policy(), &request, 0.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert!(result.reason.contains("max per transaction"));
    }

    #[test]
    fn amount_equal_to_per_transaction_cap_is_allowed() {
        let mut policy = base_policy();
        policy.approval_threshold = None; // avoid tripping the threshold check first
        let mut request = base_request();
        request.amount = Some(100.0);

        let result = evaluate(&policy, &request, 0.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn monthly_cap_exceeded_is_denied() {
        let mut request = base_request();
        request.amount = Some(50.0);

        let result = evaluate(&base_policy(), &request, 960.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert!(result.reason.contains("monthly budget"));
    }

    #[test]
    fn monthly_cap_exactly_met_is_allowed() {
        let mut policy = base_policy();
        policy.approval_threshold = None;
        let mut request = base_request();
        request.amount = Some(25.0);

        let result = evaluate(&policy, &request, 475.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn disallowed_action_is_denied() {
        let mut request = base_request();
        request.action = Some("refund".to_string());

        let result = evaluate(&base_policy(), &request, 0.0);
        assert!(matches!(result.decision, Decision::Deny));
    }

    #[test]
    fn explicit_deny_list_wins() {
        let mut policy = base_policy();
        policy.deny = vec!["test-agent".to_string()];

        let result = evaluate(&policy, &base_request(), 0.0);
        assert!(matches!(result.decision, Decision::Deny));
    }

    #[test]
    fn request_without_skill_id_bypasses_skill_scoping() {
        let mut policy = base_policy();
        policy.grant_to.skill_id = Some(ScopeSelector::One("billing".to_string()));

        let result = evaluate(&policy, &base_request(), 0.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn matching_condition_allows() {
        let mut policy = base_policy();
        policy.approval_threshold = None;
        policy.condition = Some(r#"purpose.contains("deploy")"#.to_string());

        let mut request = base_request();
        request.purpose = "deploy to production".to_string();

        let result = evaluate(&policy, &request, 0.0);
        assert!(matches!(result.decision, Decision::Allow));
    }

    #[test]
    fn non_matching_condition_denies() {
        let mut policy = base_policy();
        policy.condition = Some(r#"purpose.contains("deploy")"#.to_string());

        let mut request = base_request();
        request.purpose = "random task".to_string();

        let result = evaluate(&policy, &request, 0.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert!(result.reason.contains("CEL condition"));
    }

    #[test]
    fn evaluate_first_returns_deny_when_no_policy_matches_credential() {
        let policies = vec![base_policy()];
        let refs: Vec<&Policy> = policies.iter().collect();

        let mut request = base_request();
        request.credential_name = "other-credential".to_string();

        let result = evaluate_first(&refs, &request, 0.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert!(result.reason.contains("No policy found"));
    }

    #[test]
    fn evaluate_first_stops_at_first_allow() {
        let restrictive = {
            let mut p = base_policy();
            p.name = "restrictive".to_string();
            p.deny = vec!["test-agent".to_string()];
            p
        };
        let permissive = {
            let mut p = base_policy();
            p.name = "permissive".to_string();
            p
        };

        // restrictive denies first, permissive would allow: document order
        // means restrictive's deny does not block permissive being reached.
        let policies = vec![restrictive, permissive];
        let refs: Vec<&Policy> = policies.iter().collect();

        let result = evaluate_first(&refs, &base_request(), 0.0);
        assert!(matches!(result.decision, Decision::Allow));
        assert_eq!(result.policy_name.as_deref(), Some("permissive"));
    }

    #[test]
    fn evaluate_first_returns_last_denial_when_all_deny() {
        let first = {
            let mut p = base_policy();
            p.name = "first".to_string();
            p.deny = vec!["test-agent".to_string()];
            p
        };
        let second = {
            let mut p = base_policy();
            p.name = "second".to_string();
            p.deny = vec!["test-agent".to_string()];
            p
        };

        let policies = vec![first, second];
        let refs: Vec<&Policy> = policies.iter().collect();

        let result = evaluate_first(&refs, &base_request(), 0.0);
        assert!(matches!(result.decision, Decision::Deny));
        assert_eq!(result.policy_name.as_deref(), Some("second"));
    }

    #[test]
    fn require_approval_is_terminal_even_if_a_later_policy_would_allow() {
        let approval_first = {
            let mut p = base_policy();
            p.name = "approval-first".to_string();
            p
        };
        let permissive_second = {
            let mut p = base_policy();
            p.name = "permissive-second".to_string();
            p.approval_threshold = None;
            p
        };

        let policies = vec![approval_first, permissive_second];
        let refs: Vec<&Policy> = policies.iter().collect();

        let mut request = base_request();
        request.amount = Some(80.0); // above approval_threshold on the first policy

        let result = evaluate_first(&refs, &request, 0.0);
        assert!(matches!(result.decision, Decision::RequireApproval));
        assert_eq!(result.policy_name.as_deref(), Some("approval-first"));
    }
}
