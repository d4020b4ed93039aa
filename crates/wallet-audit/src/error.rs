//! Audit log error types.

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Malformed filter or entry arguments.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// SQLite error from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error (`scope`/`context` columns).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the audit crate.
pub type Result<T> = std::result::Result<T, AuditError>;
