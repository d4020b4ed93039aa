//! Vault error types.
//!
//! All vault operations surface errors through [`VaultError`], the single
//! error type returned by every public API in this crate.

/// Unified error type for the credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// A mutating or reading operation was attempted before [`crate::Vault::initialize`]
    /// or [`crate::Vault::unlock`] was called.
    #[error("vault is locked")]
    VaultLocked,

    /// [`crate::Vault::unlock`] was called but no salt row exists yet.
    #[error("vault is not initialized")]
    NotInitialized,

    /// [`crate::Vault::initialize`] was called but a salt row already exists.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// Decryption failed: wrong passphrase or tampered ciphertext. Per spec
    /// the caller must not be able to distinguish the two causes.
    #[error("authentication failed — wrong passphrase or corrupted data")]
    AuthenticationFailed,

    /// The requested credential does not exist.
    #[error("credential not found: {name}")]
    CredentialNotFound { name: String },

    /// A credential with this name already exists.
    #[error("credential already exists: {name}")]
    CredentialAlreadyExists { name: String },

    /// Malformed request arguments (e.g. empty name).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// SQLite error from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error (metadata column).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal vault error: {0}")]
    Internal(String),
}

impl From<wallet_crypto::CryptoError> for VaultError {
    fn from(err: wallet_crypto::CryptoError) -> Self {
        match err {
            wallet_crypto::CryptoError::AuthenticationFailed => VaultError::AuthenticationFailed,
            other => VaultError::Internal(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
