//! Local configuration for the wallet pipeline.
//!
//! Purely local paths and defaults — there is no network-facing config
//! service. Values come from environment variables, optionally loaded from
//! a `.env` file via `dotenvy`, the way the teacher's CLI loads bot
//! settings from a file-backed source.

use std::path::PathBuf;

use crate::error::{Result, WalletError};

const ENV_VAULT_PATH: &str = "WALLET_VAULT_PATH";
const ENV_AUDIT_DB_PATH: &str = "WALLET_AUDIT_DB_PATH";
const ENV_POLICY_FILE_PATH: &str = "WALLET_POLICY_FILE_PATH";
const ENV_DEFAULT_TOKEN_TTL_SECONDS: &str = "WALLET_DEFAULT_TOKEN_TTL_SECONDS";

const DEFAULT_VAULT_PATH: &str = "data/vault.db";
const DEFAULT_AUDIT_DB_PATH: &str = "data/audit.db";
const DEFAULT_POLICY_FILE_PATH: &str = "config/policies.yaml";
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 300;

/// Resolved configuration for a single wallet instance.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub vault_path: PathBuf,
    pub audit_db_path: PathBuf,
    pub policy_file_path: PathBuf,
    pub default_token_ttl_seconds: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from(DEFAULT_VAULT_PATH),
            audit_db_path: PathBuf::from(DEFAULT_AUDIT_DB_PATH),
            policy_file_path: PathBuf::from(DEFAULT_POLICY_FILE_PATH),
            default_token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }
}

impl WalletConfig {
    /// Load configuration from the process environment, optionally
    /// populated from a `.env` file in the current directory. Missing
    /// variables fall back to their defaults; a present-but-malformed
    /// numeric variable is a [`WalletError::Config`].
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
                tracing::warn!(error = %err, "failed to load .env file");
            }
        }

        let defaults = Self::default();

        let vault_path = std::env::var(ENV_VAULT_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.vault_path);
        let audit_db_path = std::env::var(ENV_AUDIT_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.audit_db_path);
        let policy_file_path = std::env::var(ENV_POLICY_FILE_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.policy_file_path);

        let default_token_ttl_seconds = match std::env::var(ENV_DEFAULT_TOKEN_TTL_SECONDS) {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                WalletError::Config(format!("{ENV_DEFAULT_TOKEN_TTL_SECONDS} must be a positive integer: {e}"))
            })?,
            Err(_) => defaults.default_token_ttl_seconds,
        };

        tracing::debug!(
            vault_path = %vault_path.display(),
            audit_db_path = %audit_db_path.display(),
            policy_file_path = %policy_file_path.display(),
            default_token_ttl_seconds,
            "resolved wallet configuration"
        );

        Ok(Self {
            vault_path,
            audit_db_path,
            policy_file_path,
            default_token_ttl_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = WalletConfig::default();
        assert_eq!(config.default_token_ttl_seconds, 300);
        assert_eq!(config.vault_path, PathBuf::from("data/vault.db"));
    }
}
