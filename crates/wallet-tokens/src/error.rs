//! Token store error types.

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token does not exist, or has already expired and been purged.
    #[error("token not found: {token_id}")]
    TokenNotFound { token_id: String },
}

/// Convenience alias used throughout the token crate.
pub type Result<T> = std::result::Result<T, TokenError>;
