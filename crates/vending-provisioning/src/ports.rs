//! Ports to the external collaborators.
//!
//! The workflow never talks to a cloud API directly. It goes through these
//! traits, implemented by `vending-aws` in production and by in-process fakes
//! in tests. Adapters flatten pagination; callers always receive complete lists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use vending_core::{fields, timestamp, AccountRequest, AccountStatus, Tag};

// ── Errors ───────────────────────────────────────────────────────────────

/// Failure talking to the org directory, the catalog or the workflow engine.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Service could not be reached or rejected the call.
    #[error("{service} unavailable: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },

    /// Service answered with something we could not use.
    #[error("Invalid {service} response: {detail}")]
    InvalidResponse {
        service: &'static str,
        detail: String,
    },
}

impl ServiceError {
    pub fn unavailable(service: &'static str, detail: impl fmt::Display) -> Self {
        Self::Unavailable {
            service,
            detail: detail.to_string(),
        }
    }

    pub fn invalid_response(service: &'static str, detail: impl fmt::Display) -> Self {
        Self::InvalidResponse {
            service,
            detail: detail.to_string(),
        }
    }
}

/// Result type for directory, catalog and launcher calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Conditional insert lost: a record for this email exists.
    #[error("Record already exists for {account_email}")]
    AlreadyExists { account_email: String },

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored item could not be mapped to or from a record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage calls.
pub type StoreResult<T> = Result<T, StoreError>;

// ── Organization directory ───────────────────────────────────────────────

/// A root or organizational unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgNode {
    pub id: String,
    pub name: String,
}

impl OrgNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Kind of a direct parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Root,
    OrganizationalUnit,
}

/// Direct parent of an account or unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub id: String,
    pub kind: ParentKind,
}

/// An account already present in the organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: String,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Organization directory service.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// Roots of the organization. Real organizations have exactly one.
    async fn list_roots(&self) -> ServiceResult<Vec<OrgNode>>;

    /// Organizational units directly under `parent_id`.
    async fn list_organizational_units(&self, parent_id: &str) -> ServiceResult<Vec<OrgNode>>;

    /// Direct parents of an account or unit.
    async fn list_parents(&self, child_id: &str) -> ServiceResult<Vec<ParentRef>>;

    /// Every account in the organization.
    async fn list_accounts(&self) -> ServiceResult<Vec<OrgAccount>>;

    /// Tags attached to a resource.
    async fn list_tags(&self, resource_id: &str) -> ServiceResult<Vec<Tag>>;
}

// ── Provisioning catalog ─────────────────────────────────────────────────

/// A product visible in the catalog admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
}

/// A portfolio offering a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioSummary {
    pub id: String,
    pub provider_name: Option<String>,
}

/// One provisioning parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningParameter {
    pub key: String,
    pub value: String,
}

impl ProvisioningParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Input of a provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionInput {
    pub product_id: String,
    pub provisioning_artifact_id: String,
    pub provisioned_product_name: String,
    pub parameters: Vec<ProvisioningParameter>,
    /// Idempotency token; repeated calls with the same token do not create a
    /// second product instance.
    pub provision_token: String,
}

/// Current state of a provisioned product instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedProductDetail {
    pub status: AccountStatus,
    pub message: String,
}

/// A declared output of a provisioned product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedOutput {
    pub key: String,
    pub value: Option<String>,
}

/// Provisioning catalog service.
#[async_trait]
pub trait ProvisioningCatalog: Send + Sync {
    /// Products owned by `owner`, from the admin listing.
    async fn search_products_as_admin(&self, owner: &str) -> ServiceResult<Vec<ProductSummary>>;

    /// Portfolios that offer a product.
    async fn list_portfolios_for_product(
        &self,
        product_id: &str,
    ) -> ServiceResult<Vec<PortfolioSummary>>;

    /// Principal ARNs associated with a portfolio.
    async fn list_principals_for_portfolio(&self, portfolio_id: &str) -> ServiceResult<Vec<String>>;

    /// Associate an IAM principal with a portfolio.
    async fn associate_principal_with_portfolio(
        &self,
        portfolio_id: &str,
        principal_arn: &str,
    ) -> ServiceResult<()>;

    /// Provisioning artifact ids of a product, oldest first.
    async fn list_provisioning_artifacts(&self, product_id: &str) -> ServiceResult<Vec<String>>;

    /// Start provisioning; returns the provisioned product id.
    async fn provision_product(&self, input: &ProvisionInput) -> ServiceResult<String>;

    /// Current status and status message of a provisioned product.
    async fn describe_provisioned_product(
        &self,
        provisioned_product_id: &str,
    ) -> ServiceResult<ProvisionedProductDetail>;

    /// Declared outputs of a provisioned product.
    async fn provisioned_product_outputs(
        &self,
        provisioned_product_id: &str,
    ) -> ServiceResult<Vec<ProvisionedOutput>>;
}

// ── Account store ────────────────────────────────────────────────────────

/// How a single field is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Unconditional overwrite.
    Overwrite,
    /// Only written when the field is absent (first write wins).
    IfAbsent,
}

/// A single field assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub value: Value,
    pub mode: UpdateMode,
}

/// A field-level update. Applying it to a missing record creates the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    updates: Vec<FieldUpdate>,
}

impl RecordUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `field`.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, value.into(), UpdateMode::Overwrite);
        self
    }

    /// Write `field` only when it is absent.
    #[must_use]
    pub fn set_if_absent(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, value.into(), UpdateMode::IfAbsent);
        self
    }

    /// Stamp `UpdatedAt` and `LastUpdateDate` with the current time.
    #[must_use]
    pub fn touch(self) -> Self {
        let now = timestamp();
        self.set(fields::UPDATED_AT, now.clone())
            .set(fields::LAST_UPDATE_DATE, now)
    }

    /// Later assignments to the same field replace earlier ones.
    fn push(&mut self, field: &str, value: Value, mode: UpdateMode) {
        self.updates.retain(|u| u.field != field);
        self.updates.push(FieldUpdate {
            field: field.to_string(),
            value,
            mode,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldUpdate> {
        self.updates.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Assignment for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldUpdate> {
        self.updates.iter().find(|u| u.field == field)
    }
}

/// Durable key-value store of account requests, keyed by `AccountEmail`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Record for an email.
    async fn get(&self, account_email: &str) -> StoreResult<Option<AccountRequest>>;

    /// First record carrying `AccountId = account_id`.
    async fn find_by_account_id(&self, account_id: &str) -> StoreResult<Option<AccountRequest>>;

    /// Records whose `AccountName` equals `account_name` exactly.
    async fn find_by_account_name(&self, account_name: &str) -> StoreResult<Vec<AccountRequest>>;

    /// Insert only if no record exists for the email.
    ///
    /// Returns [`StoreError::AlreadyExists`] when the condition fails.
    async fn insert_new(&self, record: &AccountRequest) -> StoreResult<()>;

    /// Apply a field-level update, creating the record if it is missing.
    async fn update(&self, account_email: &str, update: RecordUpdate) -> StoreResult<()>;

    /// Delete the record for an email. Deleting a missing record succeeds.
    async fn delete(&self, account_email: &str) -> StoreResult<()>;
}

// ── Workflow engine ──────────────────────────────────────────────────────

/// Starts workflow executions.
#[async_trait]
pub trait WorkflowLauncher: Send + Sync {
    /// Start one execution with `input` as its sole input. Returns an
    /// execution identifier.
    async fn start_execution(
        &self,
        execution_name: Option<&str>,
        input: &Value,
    ) -> ServiceResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_update_last_assignment_wins() {
        let update = RecordUpdate::new()
            .set(fields::STATUS, "IN_PROCESSING")
            .set_if_absent(fields::STATUS, "ACTIVE");

        assert_eq!(update.len(), 1);
        let status = update.get(fields::STATUS).unwrap();
        assert_eq!(status.value, json!("ACTIVE"));
        assert_eq!(status.mode, UpdateMode::IfAbsent);
    }

    #[test]
    fn test_touch_sets_both_timestamps() {
        let update = RecordUpdate::new().touch();
        let updated = update.get(fields::UPDATED_AT).unwrap();
        let last = update.get(fields::LAST_UPDATE_DATE).unwrap();
        assert_eq!(updated.value, last.value);
        assert_eq!(updated.mode, UpdateMode::Overwrite);
    }

    #[test]
    fn test_service_error_display() {
        let error = ServiceError::unavailable("organizations", "timeout");
        assert_eq!(error.to_string(), "organizations unavailable: timeout");
    }
}
