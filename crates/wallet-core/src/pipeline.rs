//! Orchestration of the vault, policy store, audit log, and token store
//! into the four tool-shaped operations agents actually call.
//!
//! [`Pipeline`] owns all four components directly — no locking, no shared
//! ownership — because the core is a single-threaded cooperative callee:
//! one tool invocation runs to completion before the next begins.

use std::path::Path;

use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use wallet_audit::{AuditEntry, AuditFilters, AuditLog, Event};
use wallet_policy::{CredentialRequest, Decision, PolicyStore};
use wallet_tokens::{IssueParams, TokenStore};
use wallet_vault::{CredentialKind, CredentialSummary, Metadata, Vault};

use crate::config::WalletConfig;
use crate::error::{Result, WalletError};

/// Owns the vault, policy store, audit log, and token store for one wallet
/// instance, and sequences them per tool call.
pub struct Pipeline {
    vault: Vault,
    policies: PolicyStore,
    audit: AuditLog,
    tokens: TokenStore,
}

impl Pipeline {
    /// Open every backing store named by `config`. The vault starts
    /// locked — call [`Pipeline::initialize_vault`] or
    /// [`Pipeline::unlock_vault`] before issuing any credential requests.
    pub fn open(config: &WalletConfig) -> Result<Self> {
        let vault = Vault::open(&config.vault_path)?;
        let audit = AuditLog::open(&config.audit_db_path)?;
        let policies = load_policy_store(&config.policy_file_path)?;

        Ok(Self {
            vault,
            policies,
            audit,
            tokens: TokenStore::new(),
        })
    }

    /// Build a pipeline from already-open components — the constructor
    /// tests and in-memory fixtures use.
    pub fn new(vault: Vault, policies: PolicyStore, audit: AuditLog, tokens: TokenStore) -> Self {
        Self { vault, policies, audit, tokens }
    }

    // -- Vault lifecycle passthroughs ------------------------------------

    pub fn initialize_vault(&mut self, passphrase: &[u8]) -> Result<()> {
        self.vault.initialize(passphrase)?;
        self.audit.log(AuditEntry::new(Event::VaultUnlocked))?;
        Ok(())
    }

    pub fn unlock_vault(&mut self, passphrase: &[u8]) -> Result<()> {
        self.vault.unlock(passphrase)?;
        self.audit.log(AuditEntry::new(Event::VaultUnlocked))?;
        Ok(())
    }

    pub fn lock_vault(&mut self) -> Result<()> {
        self.audit.log(AuditEntry::new(Event::VaultLocked))?;
        self.vault.close();
        Ok(())
    }

    pub fn add_credential(
        &mut self,
        name: &str,
        kind: CredentialKind,
        value: &str,
        metadata: Metadata,
    ) -> Result<i64> {
        let id = self.vault.add(name, kind, value, metadata)?;
        self.audit.log(
            AuditEntry::new(Event::CredentialAdded).with_credential_name(name),
        )?;
        Ok(id)
    }

    pub fn remove_credential(&mut self, name: &str) -> Result<bool> {
        let removed = self.vault.remove(name)?;
        if removed {
            self.audit.log(
                AuditEntry::new(Event::CredentialRemoved).with_credential_name(name),
            )?;
        }
        Ok(removed)
    }

    pub fn list_credentials(&self) -> Result<Vec<CredentialSummary>> {
        Ok(self.vault.list()?)
    }

    // -- Tool surface -----------------------------------------------------

    /// `request_credential` — the core authorization flow.
    pub fn request_credential(&mut self, request: CredentialRequest) -> Result<serde_json::Value> {
        self.audit.log(
            AuditEntry::new(Event::CredentialRequested)
                .with_agent_id(request.agent_id.as_str())
                .with_credential_name(request.credential_name.as_str())
                .with_purpose(request.purpose.as_str()),
        )?;

        // Evaluate against every policy governing this credential, not just
        // the agent-prefiltered subset: the prefilter is a narrowing
        // optimization for `list_available_policies`, but denials here must
        // carry the engine's specific reason (e.g. "not granted") rather
        // than collapsing to "no policy found" whenever the prefilter would
        // have excluded the only matching policy.
        let candidates: Vec<&wallet_policy::Policy> = self.policies.list().iter().collect();
        let monthly_spending = self.audit.monthly_spending(&request.credential_name, None)?;
        let result = wallet_policy::evaluate_first(&candidates, &request, monthly_spending);

        match result.decision {
            Decision::Deny => {
                self.audit.log(
                    AuditEntry::new(Event::CredentialDenied)
                        .with_agent_id(request.agent_id.as_str())
                        .with_credential_name(request.credential_name.as_str())
                        .with_details(result.reason.clone())
                        .with_policy(result.policy_name.clone().unwrap_or_default()),
                )?;
                Ok(json!({ "status": "denied", "reason": result.reason }))
            }
            Decision::RequireApproval => {
                let policy_name = result.policy_name.clone().unwrap_or_default();
                self.audit.log(
                    AuditEntry::new(Event::ApprovalRequired)
                        .with_agent_id(request.agent_id.as_str())
                        .with_credential_name(request.credential_name.as_str())
                        .with_policy(policy_name.clone())
                        .with_details(result.reason.clone()),
                )?;
                Ok(json!({
                    "status": "require_approval",
                    "reason": result.reason,
                    "policy": policy_name,
                }))
            }
            Decision::Allow => self.grant_credential(request, result),
        }
    }

    fn grant_credential(
        &mut self,
        request: CredentialRequest,
        result: wallet_policy::PolicyEvalResult,
    ) -> Result<serde_json::Value> {
        let credential = match self.vault.get(&request.credential_name) {
            Ok(credential) => credential,
            Err(wallet_vault::VaultError::CredentialNotFound { .. }) => {
                return Ok(json!({
                    "status": "error",
                    "reason": format!("credential '{}' not found in vault", request.credential_name),
                }));
            }
            Err(other) => return Err(WalletError::Vault(other)),
        };

        let policy_name = result.policy_name.clone().unwrap_or_default();
        let ttl_seconds = self.policies.get(&policy_name).map(|p| p.ttl);
        let scope = result.scope.clone().unwrap_or_default();

        let token = self.tokens.issue(IssueParams {
            credential_name: credential.name.clone(),
            credential_value: credential.value.clone(),
            policy_name: policy_name.clone(),
            agent_id: request.agent_id.clone(),
            skill_id: request.skill_id.clone(),
            scope: scope.clone(),
            ttl_seconds,
        });

        self.audit.log(
            AuditEntry::new(Event::CredentialGranted)
                .with_agent_id(request.agent_id.as_str())
                .with_credential_name(request.credential_name.as_str())
                .with_policy(policy_name)
                .with_token_id(token.token_id.to_string())
                .with_scope(serde_json::to_value(&scope).unwrap_or_default()),
        )?;

        Ok(json!({
            "status": "granted",
            "token_id": token.token_id,
            "credential_value": token.credential_value,
            "expires_at": millis_to_iso(token.expires_at),
            "scope": scope,
        }))
    }

    /// `list_available_policies` — never exposes `condition`, `deny`, or
    /// `scope`.
    pub fn list_available_policies(
        &self,
        agent_id: &str,
        skill_id: Option<&str>,
    ) -> Vec<wallet_policy::PolicySummary> {
        self.policies
            .list_for_agent(agent_id, skill_id)
            .iter()
            .map(|policy| wallet_policy::PolicySummary::from(*policy))
            .collect()
    }

    /// `check_budget` — uses `policy_name` if given, otherwise the first
    /// policy in document order whose `credential` matches.
    pub fn check_budget(&self, credential_name: &str, policy_name: Option<&str>) -> Result<serde_json::Value> {
        let policy = match policy_name {
            Some(name) => self.policies.get(name),
            None => self.policies.list().iter().find(|p| p.credential == credential_name),
        };

        let Some(policy) = policy else {
            return Ok(json!({
                "status": "error",
                "reason": format!("no policy found for credential '{credential_name}'"),
            }));
        };

        let budget = match &policy.budget {
            Some(budget) => budget,
            None => return Ok(json!({ "budget": "unlimited" })),
        };

        let Some(max_per_month) = budget.max_per_month else {
            return Ok(json!({ "budget": "unlimited" }));
        };

        let spent_this_month = self.audit.monthly_spending(credential_name, None)?;
        let remaining = (max_per_month - spent_this_month).max(0.0);

        Ok(json!({
            "policy": policy.name,
            "credential": credential_name,
            "max_per_month": max_per_month,
            "spent_this_month": spent_this_month,
            "remaining": remaining,
            "currency": budget.currency.clone().unwrap_or_else(|| "USD".to_string()),
            "max_per_transaction": budget.max_per_transaction,
        }))
    }

    /// `report_usage` — marks the token used and appends a
    /// `credential_used` entry; budget reconstruction reads this back.
    pub fn report_usage(
        &mut self,
        token_id: Uuid,
        amount: Option<f64>,
        currency: Option<String>,
        outcome: Option<String>,
        details: Option<String>,
    ) -> Result<serde_json::Value> {
        let Some(token) = self.tokens.get(token_id) else {
            return Ok(json!({ "status": "error" }));
        };

        self.tokens.mark_used(token_id);

        let details_payload = match amount {
            Some(amount) => json!({
                "amount": amount,
                "currency": currency.unwrap_or_else(|| "USD".to_string()),
                "details": details,
            })
            .to_string(),
            None => details.unwrap_or_default(),
        };

        let mut entry = AuditEntry::new(Event::CredentialUsed)
            .with_agent_id(token.agent_id.as_str())
            .with_credential_name(token.credential_name.as_str())
            .with_policy(token.policy_name.as_str())
            .with_token_id(token_id.to_string())
            .with_details(details_payload);

        if let Some(outcome) = outcome {
            entry = entry.with_outcome(outcome);
        }
        if let Some(skill_id) = &token.skill_id {
            entry = entry.with_skill_id(skill_id.clone());
        }

        self.audit.log(entry)?;

        Ok(json!({ "status": "recorded", "token_id": token_id }))
    }

    /// Run a purge pass over the token store. The hosting environment is
    /// expected to call this on a coarse timer (~60s); the core has no
    /// timer of its own.
    pub fn purge_expired_tokens(&mut self) -> usize {
        self.tokens.purge_expired()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn audit_query(&self, filters: &AuditFilters) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.query(filters)?)
    }
}

fn millis_to_iso(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn load_policy_store(path: &Path) -> Result<PolicyStore> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WalletError::Config(format!("failed to read policy file {}: {e}", path.display())))?;
    Ok(PolicyStore::load_from_text(&text)?)
}

