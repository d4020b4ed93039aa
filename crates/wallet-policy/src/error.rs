//! Policy error types.

/// Unified error type for policy loading and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The document failed structural or semantic validation; `path`
    /// describes where (e.g. `policies[2].ttl`).
    #[error("validation error at {path}: {reason}")]
    ValidationError { path: String, reason: String },

    /// YAML parsing failed before validation even ran.
    #[error("failed to parse policy document: {0}")]
    ParseError(String),

    /// No policy in the document has this name.
    #[error("policy not found: {name}")]
    PolicyNotFound { name: String },

    /// The condition expression failed to compile or evaluate. Per the
    /// engine's contract this never escapes `evaluate` — it is converted to
    /// a `deny` carrying the message — but the loader surfaces compile-time
    /// failures directly.
    #[error("condition expression error: {0}")]
    ExpressionError(String),
}

/// Convenience alias used throughout the policy crate.
pub type Result<T> = std::result::Result<T, PolicyError>;
