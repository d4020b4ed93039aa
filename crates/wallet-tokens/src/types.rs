//! The scoped token record and its issuance parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to a token (a policy's `scope`).
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A short-lived handle carrying a credential's plaintext value to an
/// agent, bound to the policy and identity that authorized it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedToken {
    pub token_id: Uuid,
    pub credential_name: String,
    pub credential_value: String,
    pub policy_name: String,
    pub agent_id: String,
    pub skill_id: Option<String>,
    pub scope: Attributes,
    /// Monotonic wall-clock milliseconds.
    pub issued_at: i64,
    /// Monotonic wall-clock milliseconds.
    pub expires_at: i64,
    pub used: bool,
}

/// Parameters for [`crate::TokenStore::issue`].
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub credential_name: String,
    pub credential_value: String,
    pub policy_name: String,
    pub agent_id: String,
    pub skill_id: Option<String>,
    pub scope: Attributes,
    /// Token lifetime in seconds; defaults to 300 if unset.
    pub ttl_seconds: Option<u64>,
}
