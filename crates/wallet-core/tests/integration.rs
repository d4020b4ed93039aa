//! End-to-end scenarios walking the full request → grant → use → report
//! protocol through a single [`Pipeline`].

use wallet_audit::AuditLog;
use wallet_core::{CredentialKind, CredentialRequest, Pipeline, WalletConfig};
use wallet_policy::PolicyStore;
use wallet_tokens::TokenStore;
use wallet_vault::Vault;

const STANDARD_POLICY: &str = r#"
version: "1"
policies:
  - name: stripe-charge
    credential: stripe-key
    grant_to:
      agent_id: test-agent
    actions: [charge]
    budget:
      max_per_transaction: 100
      max_per_month: 500
    approval_threshold: 75
    ttl: 60
"#;

fn pipeline_with_policy(policy_yaml: &str) -> Pipeline {
    let mut vault = Vault::open_in_memory().unwrap();
    vault.initialize(b"integration-test-pass").unwrap();
    vault
        .add(
            "stripe-key",
            CredentialKind::ApiKey,
            "test-credential-value-abc123",
            Default::default(),
        )
        .unwrap();

    let policies = PolicyStore::load_from_text(policy_yaml).unwrap();
    let audit = AuditLog::open_in_memory().unwrap();

    Pipeline::new(vault, policies, audit, TokenStore::new())
}

fn base_request() -> CredentialRequest {
    CredentialRequest {
        credential_name: "stripe-key".to_string(),
        agent_id: "test-agent".to_string(),
        skill_id: None,
        purpose: "charge customer".to_string(),
        amount: Some(25.0),
        currency: None,
        action: Some("charge".to_string()),
        context: Default::default(),
    }
}

#[test]
fn scenario_1_happy_path() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    let response = pipeline.request_credential(base_request()).unwrap();

    assert_eq!(response["status"], "granted");
    assert_eq!(response["credential_value"], "test-credential-value-abc123");
    assert!(response["expires_at"].as_str().is_some());
}

#[test]
fn scenario_2_unauthorized_agent() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    let mut request = base_request();
    request.agent_id = "unauthorized-agent".to_string();

    let response = pipeline.request_credential(request).unwrap();

    assert_eq!(response["status"], "denied");
    assert!(response["reason"].as_str().unwrap().contains("not granted"));
}

#[test]
fn scenario_3_approval_threshold() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    let mut request = base_request();
    request.amount = Some(80.0);

    let response = pipeline.request_credential(request).unwrap();

    assert_eq!(response["status"], "require_approval");
    assert!(response["reason"].as_str().unwrap().contains("approval threshold"));
}

#[test]
fn scenario_4_per_transaction_cap() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    let mut request = base_request();
    request.amount = Some(150.0);

    let response = pipeline.request_credential(request).unwrap();

    assert_eq!(response["status"], "denied");
    assert!(response["reason"].as_str().unwrap().contains("max per transaction"));
}

#[test]
fn scenario_5_monthly_cap() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    // Seed $960 of this-month spend against stripe-key via report_usage on
    // synthetic tokens, mirroring how real usage would accumulate.
    for _ in 0..3 {
        let granted = pipeline.request_credential(base_request()).unwrap();
        let token_id: uuid::Uuid = granted["token_id"].as_str().unwrap().parse().unwrap();
        pipeline
            .report_usage(token_id, Some(320.0), None, None, None)
            .unwrap();
    }

    let mut request = base_request();
    request.amount = Some(50.0);

    let response = pipeline.request_credential(request).unwrap();

    assert_eq!(response["status"], "denied");
    assert!(response["reason"].as_str().unwrap().contains("monthly budget"));
}

#[test]
fn scenario_6_condition() {
    let policy_yaml = r#"
version: "1"
policies:
  - name: deploy-only
    credential: stripe-key
    grant_to:
      agent_id: test-agent
    condition: 'purpose.contains("deploy")'
    ttl: 60
"#;
    let mut pipeline = pipeline_with_policy(policy_yaml);

    let mut allowed = base_request();
    allowed.purpose = "deploy to production".to_string();
    allowed.action = None;
    let response = pipeline.request_credential(allowed).unwrap();
    assert_eq!(response["status"], "granted");

    let mut denied = base_request();
    denied.purpose = "random task".to_string();
    denied.action = None;
    let response = pipeline.request_credential(denied).unwrap();
    assert_eq!(response["status"], "denied");
    assert!(response["reason"].as_str().unwrap().contains("CEL condition"));
}

#[test]
fn scenario_7_token_expiry() {
    let policy_yaml = r#"
version: "1"
policies:
  - name: instant-expiry
    credential: stripe-key
    grant_to:
      agent_id: test-agent
    ttl: 1
"#;
    // Issue directly against the token store with ttl=0 to exercise the
    // documented zero-TTL quirk without waiting on wall-clock time.
    let mut vault = Vault::open_in_memory().unwrap();
    vault.initialize(b"integration-test-pass").unwrap();
    vault
        .add("stripe-key", CredentialKind::ApiKey, "v", Default::default())
        .unwrap();
    let policies = PolicyStore::load_from_text(policy_yaml).unwrap();
    let audit = AuditLog::open_in_memory().unwrap();
    let mut tokens = TokenStore::new();
    let issued = tokens.issue(wallet_tokens::IssueParams {
        credential_name: "stripe-key".to_string(),
        credential_value: "v".to_string(),
        policy_name: "instant-expiry".to_string(),
        agent_id: "test-agent".to_string(),
        skill_id: None,
        scope: Default::default(),
        ttl_seconds: Some(0),
    });

    let mut pipeline = Pipeline::new(vault, policies, audit, tokens);

    let response = pipeline
        .report_usage(issued.token_id, None, None, None, None)
        .unwrap();
    assert_eq!(response["status"], "error");
}

#[test]
fn list_available_policies_never_leaks_condition_or_scope() {
    let policy_yaml = r#"
version: "1"
policies:
  - name: secret-policy
    credential: stripe-key
    grant_to:
      agent_id: test-agent
    condition: 'amount < 10'
    scope:
      tier: internal
    ttl: 60
"#;
    let pipeline = pipeline_with_policy(policy_yaml);
    let summaries = pipeline.list_available_policies("test-agent", None);

    assert_eq!(summaries.len(), 1);
    let serialized = serde_json::to_string(&summaries[0]).unwrap();
    assert!(!serialized.contains("condition"));
    assert!(!serialized.contains("internal"));
}

#[test]
fn check_budget_reports_remaining_after_usage() {
    let mut pipeline = pipeline_with_policy(STANDARD_POLICY);

    let granted = pipeline.request_credential(base_request()).unwrap();
    let token_id: uuid::Uuid = granted["token_id"].as_str().unwrap().parse().unwrap();
    pipeline.report_usage(token_id, Some(25.0), None, None, None).unwrap();

    let budget = pipeline.check_budget("stripe-key", None).unwrap();
    assert_eq!(budget["max_per_month"], 500.0);
    assert_eq!(budget["spent_this_month"], 25.0);
    assert_eq!(budget["remaining"], 475.0);
}

#[test]
fn check_budget_unlimited_when_no_monthly_cap() {
    let policy_yaml = r#"
version: "1"
policies:
  - name: no-cap
    credential: stripe-key
    grant_to:
      agent_id: test-agent
    ttl: 60
"#;
    let pipeline = pipeline_with_policy(policy_yaml);
    let budget = pipeline.check_budget("stripe-key", None).unwrap();
    assert_eq!(budget["budget"], "unlimited");
}

#[test]
fn pipeline_open_wires_up_on_disk_components() {
    let dir = tempfile::tempdir().unwrap();
    let policy_path = dir.path().join("policies.yaml");
    std::fs::write(&policy_path, STANDARD_POLICY).unwrap();

    let config = WalletConfig {
        vault_path: dir.path().join("vault.db"),
        audit_db_path: dir.path().join("audit.db"),
        policy_file_path: policy_path,
        default_token_ttl_seconds: 300,
    };

    let mut pipeline = Pipeline::open(&config).unwrap();
    pipeline.initialize_vault(b"integration-test-pass").unwrap();
    pipeline
        .add_credential(
            "stripe-key",
            CredentialKind::ApiKey,
            "test-credential-value-abc123",
            Default::default(),
        )
        .unwrap();

    let response = pipeline.request_credential(base_request()).unwrap();
    assert_eq!(response["status"], "granted");
    assert_eq!(response["credential_value"], "test-credential-value-abc123");
}
