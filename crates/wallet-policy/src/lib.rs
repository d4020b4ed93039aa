//! Declarative policy model, loader, and evaluation engine.
//!
//! A [`loader::PolicyStore`] parses and validates a YAML policy document;
//! the [`engine`] module evaluates a single request against one policy or
//! against the ordered set of policies governing a credential. The engine
//! is a pure function of its inputs — it never queries the audit log
//! itself, which keeps it trivially testable (see [`evaluate`]).

pub mod engine;
pub mod error;
pub mod loader;
pub mod types;

pub use engine::{evaluate, evaluate_first};
pub use error::{PolicyError, Result};
pub use loader::PolicyStore;
pub use types::{
    Attributes, Budget, CredentialRequest, Decision, GrantTo, Policy, PolicyDocument,
    PolicyEvalResult, PolicySummary, ScopeSelector,
};
