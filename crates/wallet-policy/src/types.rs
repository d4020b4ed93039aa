//! The declarative policy document shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scope selector field (`grant_to.agent_id`, `grant_to.skill_id`):
/// either a single literal, a list of literals, or the wildcard `"*"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeSelector {
    One(String),
    Many(Vec<String>),
}

impl ScopeSelector {
    /// `true` if this selector is the literal wildcard `"*"`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::One(s) if s == "*")
    }

    /// `true` if `value` matches this selector (wildcard always matches).
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::One(s) => s == "*" || s == value,
            Self::Many(list) => list.iter().any(|s| s == value),
        }
    }
}

/// Agent/skill scope selector attached to a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantTo {
    pub agent_id: Option<ScopeSelector>,
    pub skill_id: Option<ScopeSelector>,
}

/// Spending limits attached to a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Budget {
    pub max_per_transaction: Option<f64>,
    pub max_per_month: Option<f64>,
    pub currency: Option<String>,
}

/// Free-form, non-secret key-value attributes (policy `scope`, request
/// `context`).
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A single declarative authorization rule for one credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub credential: String,
    pub grant_to: GrantTo,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub approval_threshold: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub scope: Attributes,
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_ttl() -> u64 {
    300
}

/// The top-level policy document: a version tag plus an ordered list of
/// policies. Document order is semantically significant — see the engine's
/// `evaluate_first`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// A projection of [`Policy`] safe to hand back to an agent: never
/// `condition`, `deny`, or `scope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySummary {
    pub name: String,
    pub description: Option<String>,
    pub credential: String,
    pub actions: Option<Vec<String>>,
    pub budget: Option<Budget>,
    pub ttl: u64,
}

impl From<&Policy> for PolicySummary {
    fn from(policy: &Policy) -> Self {
        Self {
            name: policy.name.clone(),
            description: policy.description.clone(),
            credential: policy.credential.clone(),
            actions: policy.actions.clone(),
            budget: policy.budget.clone(),
            ttl: policy.ttl,
        }
    }
}

/// The input to the policy engine: a single credential access request.
#[derive(Debug, Clone, Default)]
pub struct CredentialRequest {
    pub credential_name: String,
    pub agent_id: String,
    pub skill_id: Option<String>,
    pub purpose: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub action: Option<String>,
    pub context: Attributes,
}

/// The outcome of evaluating one or more policies against a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum Decision {
    Allow,
    Deny,
    RequireApproval,
}

/// The full result of a policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvalResult {
    pub decision: Decision,
    pub reason: String,
    pub policy_name: Option<String>,
    pub scope: Option<Attributes>,
}

impl PolicyEvalResult {
    pub fn allow(policy_name: &str, scope: Attributes) -> Self {
        Self {
            decision: Decision::Allow,
            reason: "all checks passed".to_string(),
            policy_name: Some(policy_name.to_string()),
            scope: Some(scope),
        }
    }

    pub fn deny(policy_name: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
            policy_name: policy_name.map(str::to_string),
            scope: None,
        }
    }

    pub fn require_approval(policy_name: &str, reason: impl Into<String>, scope: Attributes) -> Self {
        Self {
            decision: Decision::RequireApproval,
            reason: reason.into(),
            policy_name: Some(policy_name.to_string()),
            scope: Some(scope),
        }
    }
}
