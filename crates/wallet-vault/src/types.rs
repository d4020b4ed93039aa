//! Credential types stored in the vault.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of credential stored in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Static API key or bearer token.
    ApiKey,
    /// Payment processor token (e.g. a Stripe restricted key).
    PaymentToken,
    /// OAuth2 access/refresh token.
    OauthToken,
    /// Generic opaque secret.
    Secret,
    /// A certificate or key material blob.
    Certificate,
}

impl CredentialKind {
    /// Convert to the string stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::PaymentToken => "payment_token",
            Self::OauthToken => "oauth_token",
            Self::Secret => "secret",
            Self::Certificate => "certificate",
        }
    }

    /// Parse from the string stored in SQLite.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api_key" => Some(Self::ApiKey),
            "payment_token" => Some(Self::PaymentToken),
            "oauth_token" => Some(Self::OauthToken),
            "secret" => Some(Self::Secret),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form, non-secret metadata attached to a credential.
pub type Metadata = BTreeMap<String, String>;

/// A credential with its decrypted value, as returned by [`crate::Vault::get`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque database row identifier.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// The kind of secret this credential holds.
    pub kind: CredentialKind,
    /// The decrypted plaintext value.
    pub value: String,
    /// Free-form, non-secret attributes.
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A credential summary without the decrypted value, as returned by
/// [`crate::Vault::list`]. `list` must never expose plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: i64,
    pub name: String,
    pub kind: CredentialKind,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
