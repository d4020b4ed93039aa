//! Audit entry shape and the closed set of events it may record.

use serde::{Deserialize, Serialize};

/// The closed set of events the audit log may record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    CredentialRequested,
    CredentialGranted,
    CredentialDenied,
    CredentialUsed,
    ApprovalRequired,
    TokenExpired,
    VaultUnlocked,
    VaultLocked,
    CredentialAdded,
    CredentialRemoved,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialRequested => "credential_requested",
            Self::CredentialGranted => "credential_granted",
            Self::CredentialDenied => "credential_denied",
            Self::CredentialUsed => "credential_used",
            Self::ApprovalRequired => "approval_required",
            Self::TokenExpired => "token_expired",
            Self::VaultUnlocked => "vault_unlocked",
            Self::VaultLocked => "vault_locked",
            Self::CredentialAdded => "credential_added",
            Self::CredentialRemoved => "credential_removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credential_requested" => Some(Self::CredentialRequested),
            "credential_granted" => Some(Self::CredentialGranted),
            "credential_denied" => Some(Self::CredentialDenied),
            "credential_used" => Some(Self::CredentialUsed),
            "approval_required" => Some(Self::ApprovalRequired),
            "token_expired" => Some(Self::TokenExpired),
            "vault_unlocked" => Some(Self::VaultUnlocked),
            "vault_locked" => Some(Self::VaultLocked),
            "credential_added" => Some(Self::CredentialAdded),
            "credential_removed" => Some(Self::CredentialRemoved),
            _ => None,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry. `id` and `timestamp` are assigned by
/// [`crate::AuditLog::log`] when left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Option<i64>,
    /// ISO-8601 UTC timestamp with a `Z` suffix. Defaulted to now at
    /// `log()` time if omitted.
    pub timestamp: Option<String>,
    pub event: Option<Event>,
    pub policy: Option<String>,
    pub agent_id: Option<String>,
    pub skill_id: Option<String>,
    pub purpose: Option<String>,
    pub token_id: Option<String>,
    pub credential_name: Option<String>,
    /// Serialized as JSON text in storage.
    pub scope: Option<serde_json::Value>,
    /// Serialized as JSON text in storage.
    pub context: Option<serde_json::Value>,
    pub outcome: Option<String>,
    pub approval: Option<String>,
    /// Free-form text; may carry a JSON object containing an `amount` field.
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(event: Event) -> Self {
        Self {
            event: Some(event),
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_skill_id(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    pub fn with_credential_name(mut self, credential_name: impl Into<String>) -> Self {
        self.credential_name = Some(credential_name.into());
        self
    }

    pub fn with_scope(mut self, scope: serde_json::Value) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Optional filters for [`crate::AuditLog::query`]. Results are returned
/// newest-first by identifier.
#[derive(Debug, Clone, Default)]
pub struct AuditFilters {
    pub event: Option<Event>,
    pub policy: Option<String>,
    pub agent_id: Option<String>,
    /// Inclusive lexicographic `>=` comparison on the ISO timestamp.
    pub since: Option<String>,
    pub limit: Option<usize>,
}
