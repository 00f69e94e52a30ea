//! Stage Tests
//!
//! Tests for the individual workflow stages against in-process fakes:
//! - Validation: required fields, formats, duplicates, re-processing
//! - Orchestration: product lookup, principal association, persisted state
//! - Polling: transient and terminal statuses
//! - Reconciliation: finalize and compensate
//! - Bootstrap import

mod common;

use serde_json::json;

use common::*;
use vending_core::{fields, AccountRequest, AccountStatus, StageErrorKind, Tag};
use vending_provisioning::ports::{AccountStore, ProvisionedOutput, RecordUpdate};
use vending_provisioning::{BootstrapJob, CompensationStatus, UNKNOWN_PATH};

async fn seed(harness: &Harness, email: &str, status: AccountStatus) {
    let record = AccountRequest {
        account_email: email.to_string(),
        account_name: "team x".to_string(),
        org_unit: "Engineering/Platform".to_string(),
        status: Some(status),
        request_id: "req-seeded".to_string(),
        created_at: Some("2024-01-01T00:00:00.000000Z".to_string()),
        ..AccountRequest::default()
    };
    harness.store.insert_new(&record).await.unwrap();
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validate_normalizes_and_marks() {
    let harness = Harness::default_setup();
    let mut raw = payload(" Dev@Co.com ", "Team X");
    raw["SSOUserFirstName"] = json!("jANE");

    let request = harness.validator.validate(raw).await.unwrap();
    assert_eq!(request.account_email, "dev@co.com");
    assert_eq!(request.account_name, "team x");
    assert_eq!(request.sso_user_first_name, "Jane");
    assert_eq!(request.validation, Some(true));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_validate_missing_fields_carries_email() {
    let harness = Harness::default_setup();
    let mut raw = payload("dev@co.com", "Team X");
    raw.as_object_mut().unwrap().remove("RequestID");
    raw.as_object_mut().unwrap().remove("OrgUnit");

    let err = harness.validator.validate(raw).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::MissingFields);
    assert_eq!(err.account_email, "dev@co.com");
    assert!(err.message.contains("OrgUnit, RequestID"));
}

#[tokio::test]
async fn test_validate_rejects_bad_email() {
    let harness = Harness::default_setup();
    let mut raw = payload("dev@co.com", "Team X");
    raw["SSOUserEmail"] = json!("not-an-email");

    let err = harness.validator.validate(raw).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::InvalidFormat);
}

#[tokio::test]
async fn test_validate_rejects_duplicate_in_org() {
    let harness = Harness::new(
        FakeDirectory::new().with_account("123", "Team X", "other@co.com", "r-root"),
        FakeCatalog::new(),
    );

    let err = harness
        .validator
        .validate(payload("dev@co.com", "TEAM x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StageErrorKind::DuplicateInOrg);

    let harness = Harness::new(
        FakeDirectory::new().with_account("123", "Other", "DEV@co.com", "r-root"),
        FakeCatalog::new(),
    );
    let err = harness
        .validator
        .validate(payload("dev@co.com", "Team X"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StageErrorKind::DuplicateInOrg);
}

#[tokio::test]
async fn test_validate_rejects_request_already_in_flight() {
    let harness = Harness::default_setup();
    seed(&harness, "dev@co.com", AccountStatus::InProcessing).await;

    let err = harness
        .validator
        .validate(payload("dev@co.com", "Team X"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StageErrorKind::AlreadyProcessing);
}

#[tokio::test]
async fn test_validate_accepts_requested_record() {
    let harness = Harness::default_setup();
    seed(&harness, "dev@co.com", AccountStatus::Requested).await;

    assert!(harness
        .validator
        .validate(payload("dev@co.com", "Team X"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_validate_directory_outage_is_unexpected() {
    let harness = Harness::default_setup();
    harness.directory.set_unreachable(true);

    let err = harness
        .validator
        .validate(payload("dev@co.com", "Team X"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, StageErrorKind::Unexpected);
    assert_eq!(err.account_email, "dev@co.com");
}

// =============================================================================
// Orchestration
// =============================================================================

async fn validated(harness: &Harness) -> AccountRequest {
    seed(harness, "dev@co.com", AccountStatus::Requested).await;
    harness
        .validator
        .validate(payload("dev@co.com", "Team X"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_provision_persists_correlation_fields() {
    let harness = Harness::default_setup();
    let request = validated(&harness).await;

    let request = harness.orchestrator.provision(request).await.unwrap();
    assert_eq!(request.status, Some(AccountStatus::InProcessing));
    assert_eq!(request.provisioning, Some(true));
    assert_eq!(request.provisioned_product_id.as_deref(), Some(PROVISIONED_PRODUCT_ID));

    let stored = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AccountStatus::InProcessing));
    assert_eq!(stored.product_id.as_deref(), Some(PRODUCT_ID));
    assert_eq!(stored.portfolio_id.as_deref(), Some(PORTFOLIO_ID));
    assert_eq!(stored.provisioning_artifact_id.as_deref(), Some("pa-latest"));
    assert_eq!(stored.principal_arn.as_deref(), Some(PRINCIPAL_ARN));
    assert_eq!(
        stored.provisioned_product_name.as_deref(),
        Some("AccountLaunch-team x")
    );
    assert_eq!(stored.created_at.as_deref(), Some("2024-01-01T00:00:00.000000Z"));
    assert!(stored.updated_at.is_some());

    let provisions = harness.catalog.provisions();
    assert_eq!(provisions.len(), 1);
    assert_eq!(provisions[0].provision_token, "0b7c6a0e-5f1b-4a3b-9a57-3c1d2e4f5a6b");
    assert_eq!(provisions[0].provisioning_artifact_id, "pa-latest");
}

#[tokio::test]
async fn test_provision_associates_principal_once() {
    let harness = Harness::default_setup();
    let request = validated(&harness).await;
    harness.orchestrator.provision(request.clone()).await.unwrap();
    harness.orchestrator.provision(request).await.unwrap();

    assert_eq!(harness.catalog.associate_calls(), 1);
}

#[tokio::test]
async fn test_provision_skips_association_when_present() {
    let harness = Harness::new(
        FakeDirectory::new(),
        FakeCatalog::new().with_principal(PRINCIPAL_ARN),
    );
    let request = validated(&harness).await;
    harness.orchestrator.provision(request).await.unwrap();

    assert_eq!(harness.catalog.associate_calls(), 0);
}

#[tokio::test]
async fn test_provision_product_not_found() {
    let harness = Harness::new(FakeDirectory::new(), FakeCatalog::new().without_product());
    let request = validated(&harness).await;

    let err = harness.orchestrator.provision(request).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::ProductNotFound);
    assert!(harness.catalog.provisions().is_empty());
}

#[tokio::test]
async fn test_provision_association_failure() {
    let harness = Harness::new(
        FakeDirectory::new(),
        FakeCatalog::new().with_associate_error(),
    );
    let request = validated(&harness).await;

    let err = harness.orchestrator.provision(request).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::PrincipalAssociationFailed);
}

#[tokio::test]
async fn test_provision_error_status_persists_then_fails() {
    let harness = Harness::new(
        FakeDirectory::new(),
        FakeCatalog::new().with_statuses(vec![AccountStatus::Error]),
    );
    let request = validated(&harness).await;

    let err = harness.orchestrator.provision(request).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::ProvisioningError);
    assert_eq!(err.account_email, "dev@co.com");

    let stored = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AccountStatus::Error));
    assert_eq!(stored.provisioned_product_id.as_deref(), Some(PROVISIONED_PRODUCT_ID));
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test]
async fn test_poll_under_change_never_overwrites_stored_status() {
    let harness = Harness::default_setup();
    let request = validated(&harness).await;
    let request = harness.orchestrator.provision(request).await.unwrap();

    let checked = harness.poller.check(request).await.unwrap();
    assert_eq!(checked.status, Some(AccountStatus::InProcessing));
    assert_eq!(checked.check_status, Some(true));

    let stored = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AccountStatus::InProcessing));
}

#[tokio::test]
async fn test_poll_missing_product_id() {
    let harness = Harness::default_setup();
    let request = AccountRequest {
        account_email: "dev@co.com".to_string(),
        ..AccountRequest::default()
    };

    let err = harness.poller.check(request).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::MissingFields);
    assert_eq!(err.account_email, "dev@co.com");
    assert_eq!(harness.catalog.describe_calls(), 0);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_finalize_records_account_id() {
    let harness = Harness::default_setup();
    seed(&harness, "dev@co.com", AccountStatus::InProcessing).await;
    let request = AccountRequest {
        account_email: "dev@co.com".to_string(),
        provisioned_product_id: Some(PROVISIONED_PRODUCT_ID.to_string()),
        ..AccountRequest::default()
    };

    let done = harness.reconciler.finalize(request).await.unwrap();
    assert_eq!(done.success.as_deref(), Some("True"));
    assert_eq!(done.account_id.as_deref(), Some(NEW_ACCOUNT_ID));

    let stored = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AccountStatus::Active));
    assert_eq!(stored.account_id.as_deref(), Some(NEW_ACCOUNT_ID));
}

#[tokio::test]
async fn test_finalize_without_account_id_output() {
    let harness = Harness::new(
        FakeDirectory::new(),
        FakeCatalog::new().with_outputs(vec![ProvisionedOutput {
            key: "SSOUserPortal".to_string(),
            value: Some("https://portal".to_string()),
        }]),
    );
    seed(&harness, "dev@co.com", AccountStatus::InProcessing).await;
    let request = AccountRequest {
        account_email: "dev@co.com".to_string(),
        provisioned_product_id: Some(PROVISIONED_PRODUCT_ID.to_string()),
        ..AccountRequest::default()
    };

    let err = harness.reconciler.finalize(request).await.unwrap_err();
    assert_eq!(err.kind, StageErrorKind::AccountIdMissing);

    let stored = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(stored.status, Some(AccountStatus::Error));
    assert_eq!(stored.account_id.as_deref(), Some("N/A"));
}

#[tokio::test]
async fn test_compensate_engine_envelope_deletes_record() {
    let harness = Harness::default_setup();
    seed(&harness, "dev@co.com", AccountStatus::Error).await;

    let stage = json!({
        "errorType": "ProvisioningError",
        "errorMessage": "Provisioning failed",
        "account_email": "dev@co.com"
    });
    let event = json!({
        "Error": "Exception",
        "Cause": json!({"errorMessage": stage.to_string()}).to_string()
    });

    let ack = harness.reconciler.compensate(&event).await;
    assert_eq!(ack.success, "False");
    assert_eq!(ack.account_email, "dev@co.com");
    assert_eq!(ack.status, CompensationStatus::RequestRemoved);
    assert!(harness.store.get("dev@co.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_compensate_without_email_deletes_nothing() {
    let harness = Harness::default_setup();
    seed(&harness, "dev@co.com", AccountStatus::Requested).await;

    let ack = harness
        .reconciler
        .compensate(&json!({"errorType": "MissingFields", "errorMessage": "Missing"}))
        .await;
    assert_eq!(ack.status, CompensationStatus::NothingToRemove);
    assert_eq!(harness.store.len().await, 1);

    let ack = harness.reconciler.compensate(&json!("garbage")).await;
    assert_eq!(ack.status, CompensationStatus::NothingToRemove);
}

// =============================================================================
// Org unit resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_for_account_unreachable_directory() {
    let harness = Harness::new(
        FakeDirectory::new().with_account("123", "A", "a@co.com", "ou-platform"),
        FakeCatalog::new(),
    );
    harness.directory.set_unreachable(true);

    assert_eq!(harness.resolver.resolve_for_account("123").await, UNKNOWN_PATH);
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_bootstrap_imports_accounts() {
    let directory = FakeDirectory::new()
        .with_account("111111111111", "Management", "Mgmt@co.com", "r-root")
        .with_account("222222222222", "Platform Dev", "platform@co.com", "ou-platform")
        .with_tags("222222222222", vec![Tag::new("team", "platform")]);
    let harness = Harness::new(directory, FakeCatalog::new());
    let job = BootstrapJob::new(
        harness.directory.clone(),
        harness.resolver.clone(),
        harness.store.clone(),
    );

    let summary = job.run().await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failed, 0);

    let mgmt = harness.store.get("mgmt@co.com").await.unwrap().unwrap();
    assert_eq!(mgmt.org_unit, "Root");
    assert_eq!(mgmt.request_id, "bootstrap-111111111111");
    assert_eq!(mgmt.status, Some(AccountStatus::Active));
    assert_eq!(mgmt.sso_user_email, "");

    let platform = harness.store.get("platform@co.com").await.unwrap().unwrap();
    assert_eq!(platform.org_unit, "Root/Engineering/Platform");
    assert_eq!(platform.tags, vec![Tag::new("team", "platform")]);
}

#[tokio::test]
async fn test_bootstrap_rerun_preserves_lifecycle_fields() {
    let directory =
        FakeDirectory::new().with_account("222222222222", "Platform", "dev@co.com", "ou-platform");
    let harness = Harness::new(directory, FakeCatalog::new());
    seed(&harness, "dev@co.com", AccountStatus::Active).await;
    harness
        .store
        .update(
            "dev@co.com",
            RecordUpdate::new().set(fields::SSO_USER_EMAIL, "sso@co.com"),
        )
        .await
        .unwrap();

    let job = BootstrapJob::new(
        harness.directory.clone(),
        harness.resolver.clone(),
        harness.store.clone(),
    );
    job.run().await.unwrap();
    job.run().await.unwrap();

    let record = harness.store.get("dev@co.com").await.unwrap().unwrap();
    assert_eq!(record.request_id, "req-seeded");
    assert_eq!(record.created_at.as_deref(), Some("2024-01-01T00:00:00.000000Z"));
    assert_eq!(record.sso_user_email, "sso@co.com");
    assert_eq!(record.account_name, "Platform");
    assert_eq!(record.account_id.as_deref(), Some("222222222222"));
}

#[tokio::test]
async fn test_bootstrap_tag_failure_writes_empty_tags() {
    let directory = FakeDirectory::new()
        .with_account("333333333333", "Sandbox", "sb@co.com", "ou-sandbox")
        .with_tags_error();
    let harness = Harness::new(directory, FakeCatalog::new());
    let job = BootstrapJob::new(
        harness.directory.clone(),
        harness.resolver.clone(),
        harness.store.clone(),
    );

    let summary = job.run().await.unwrap();
    assert_eq!(summary.inserted, 1);

    let item = harness.store.item("sb@co.com").await.unwrap();
    assert_eq!(item["Tags"], json!([]));
    assert_eq!(item["OrgUnit"], "Root/Sandbox");
}

#[tokio::test]
async fn test_bootstrap_listing_failure_aborts() {
    let harness = Harness::default_setup();
    harness.directory.set_unreachable(true);
    let job = BootstrapJob::new(
        harness.directory.clone(),
        harness.resolver.clone(),
        harness.store.clone(),
    );

    assert!(job.run().await.is_err());
    assert!(harness.store.is_empty().await);
}
