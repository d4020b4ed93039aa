//! Top-level pipeline error types.
//!
//! Only used for failures that abort a tool call outright (catastrophic
//! I/O, a locked vault). `deny` and `require_approval` are first-class
//! outcomes, not errors — see [`crate::pipeline::Pipeline::request_credential`].

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error(transparent)]
    Vault(#[from] wallet_vault::VaultError),

    #[error(transparent)]
    Policy(#[from] wallet_policy::PolicyError),

    #[error(transparent)]
    Audit(#[from] wallet_audit::AuditError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, WalletError>;
