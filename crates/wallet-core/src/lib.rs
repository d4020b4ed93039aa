//! Wires the vault, policy engine, audit log, and token store into the
//! four tool-shaped operations an agent actually calls: `request_credential`,
//! `list_available_policies`, `check_budget`, `report_usage`.
//!
//! [`Pipeline`] is the single entry point; [`WalletConfig`] resolves the
//! local paths and defaults it is built from. Everything here is plain
//! synchronous Rust — no locks, no process-wide mutable state beyond the
//! key the vault holds internally.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::WalletConfig;
pub use error::{Result, WalletError};
pub use pipeline::Pipeline;

pub use wallet_audit::{AuditEntry, AuditFilters, Event};
pub use wallet_policy::{CredentialRequest, Decision, Policy, PolicyEvalResult, PolicySummary};
pub use wallet_vault::{Credential, CredentialKind, CredentialSummary, Metadata};
