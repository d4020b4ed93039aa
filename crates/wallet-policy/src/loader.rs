//! Parsing and validation of policy documents.

use crate::error::{PolicyError, Result};
use crate::types::{GrantTo, Policy, PolicyDocument, ScopeSelector};

const SUPPORTED_VERSION: &str = "1";

/// Holds a validated, loaded [`PolicyDocument`] and exposes lookups over it.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    document: PolicyDocument,
}

impl PolicyStore {
    /// Parse and validate a YAML policy document from text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ParseError`] if the text is not valid YAML or
    /// does not match the document shape (including unknown fields), or
    /// [`PolicyError::ValidationError`] if it parses but fails semantic
    /// validation.
    pub fn load_from_text(text: &str) -> Result<Self> {
        let document: PolicyDocument =
            serde_yaml::from_str(text).map_err(|e| PolicyError::ParseError(e.to_string()))?;
        Self::load_from_value(document)
    }

    /// Validate an already-parsed [`PolicyDocument`].
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ValidationError`] on the first failing rule.
    pub fn load_from_value(document: PolicyDocument) -> Result<Self> {
        validate(&document)?;
        tracing::info!(policy_count = document.policies.len(), "loaded policy document");
        Ok(Self { document })
    }

    /// Look up a single policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.document.policies.iter().find(|p| p.name == name)
    }

    /// All policies, in document order.
    pub fn list(&self) -> &[Policy] {
        &self.document.policies
    }

    /// Pre-filter policies relevant to `agent_id` (and optionally
    /// `skill_id`). This is a conservative narrowing step, not an
    /// authorization decision — the engine still performs the binding
    /// checks.
    pub fn list_for_agent(&self, agent_id: &str, skill_id: Option<&str>) -> Vec<&Policy> {
        self.document
            .policies
            .iter()
            .filter(|policy| pre_filter_matches(policy, agent_id, skill_id))
            .collect()
    }
}

fn pre_filter_matches(policy: &Policy, agent_id: &str, skill_id: Option<&str>) -> bool {
    if policy.deny.iter().any(|denied| denied == agent_id) {
        return false;
    }

    if let Some(selector) = &policy.grant_to.agent_id {
        if !selector.is_wildcard() && !selector.matches(agent_id) {
            return false;
        }
    }

    if let Some(requested_skill) = skill_id {
        if let Some(selector) = &policy.grant_to.skill_id {
            if !selector.is_wildcard() && !selector.matches(requested_skill) {
                return false;
            }
        }
    }

    true
}

fn validate(document: &PolicyDocument) -> Result<()> {
    if document.version != SUPPORTED_VERSION {
        return Err(PolicyError::ValidationError {
            path: "version".to_string(),
            reason: format!("unsupported policy document version '{}'", document.version),
        });
    }

    for (idx, policy) in document.policies.iter().enumerate() {
        let prefix = format!("policies[{idx}]");
        validate_policy(&prefix, policy)?;
    }

    Ok(())
}

fn validate_policy(prefix: &str, policy: &Policy) -> Result<()> {
    if policy.name.trim().is_empty() {
        return Err(PolicyError::ValidationError {
            path: format!("{prefix}.name"),
            reason: "name must not be empty".to_string(),
        });
    }

    if policy.credential.trim().is_empty() {
        return Err(PolicyError::ValidationError {
            path: format!("{prefix}.credential"),
            reason: "credential must not be empty".to_string(),
        });
    }

    validate_grant_to(prefix, &policy.grant_to)?;

    if let Some(budget) = &policy.budget {
        if let Some(limit) = budget.max_per_transaction {
            if limit <= 0.0 {
                return Err(PolicyError::ValidationError {
                    path: format!("{prefix}.budget.max_per_transaction"),
                    reason: "must be strictly positive".to_string(),
                });
            }
        }
        if let Some(limit) = budget.max_per_month {
            if limit <= 0.0 {
                return Err(PolicyError::ValidationError {
                    path: format!("{prefix}.budget.max_per_month"),
                    reason: "must be strictly positive".to_string(),
                });
            }
        }
    }

    if let Some(threshold) = policy.approval_threshold {
        if threshold <= 0.0 {
            return Err(PolicyError::ValidationError {
                path: format!("{prefix}.approval_threshold"),
                reason: "must be strictly positive".to_string(),
            });
        }
    }

    if policy.ttl == 0 {
        return Err(PolicyError::ValidationError {
            path: format!("{prefix}.ttl"),
            reason: "ttl must be a positive integer".to_string(),
        });
    }

    if let Some(condition) = &policy.condition {
        if let Err(e) = cel_interpreter::Program::compile(condition) {
            return Err(PolicyError::ValidationError {
                path: format!("{prefix}.condition"),
                reason: format!("invalid condition expression: {e}"),
            });
        }
    }

    Ok(())
}

fn validate_grant_to(prefix: &str, grant_to: &GrantTo) -> Result<()> {
    if let Some(ScopeSelector::Many(list)) = &grant_to.agent_id {
        if list.is_empty() {
            return Err(PolicyError::ValidationError {
                path: format!("{prefix}.grant_to.agent_id"),
                reason: "list must not be empty".to_string(),
            });
        }
    }
    if let Some(ScopeSelector::Many(list)) = &grant_to.skill_id {
        if list.is_empty() {
            return Err(PolicyError::ValidationError {
                path: format!("{prefix}.grant_to.skill_id"),
                reason: "list must not be empty".to_string(),
            });
        }
    }
    Ok(())
}
