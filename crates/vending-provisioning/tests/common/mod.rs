//! Shared fakes for workflow tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vending_core::{AccountStatus, Tag};
use vending_provisioning::ports::{
    OrgAccount, OrgDirectory, OrgNode, ParentKind, ParentRef, PortfolioSummary, ProductSummary,
    ProvisionInput, ProvisionedOutput, ProvisionedProductDetail, ProvisioningCatalog, ServiceError,
    ServiceResult,
};
use vending_provisioning::{
    InMemoryAccountStore, InlineWorkflow, OrgUnitResolver, ProvisioningConfig,
    ProvisioningOrchestrator, Reconciler, RequestValidator, StatusPoller, WorkflowConfig,
};

pub const PRINCIPAL_ARN: &str = "arn:aws:iam::111111111111:role/vending";
pub const PRODUCT_ID: &str = "prod-factory";
pub const PORTFOLIO_ID: &str = "port-ct";
pub const PROVISIONED_PRODUCT_ID: &str = "pp-0001";
pub const NEW_ACCOUNT_ID: &str = "210987654321";

// =============================================================================
// Organization directory
// =============================================================================

/// Organization with root `r-root` named "Root", units
/// `Engineering/Platform` and `Sandbox`, and whatever accounts are added.
pub struct FakeDirectory {
    accounts: Mutex<Vec<OrgAccount>>,
    parents: Mutex<Vec<(String, ParentRef)>>,
    tags: Mutex<Vec<(String, Vec<Tag>)>>,
    unreachable: AtomicBool,
    tags_fail: AtomicBool,
    list_accounts_calls: AtomicUsize,
}

impl FakeDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
            tags: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            tags_fail: AtomicBool::new(false),
            list_accounts_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_account(self, id: &str, name: &str, email: &str, parent_id: &str) -> Self {
        self.accounts.lock().unwrap().push(OrgAccount {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            status: "ACTIVE".to_string(),
            joined_at: None,
        });
        let kind = if parent_id.starts_with("r-") {
            ParentKind::Root
        } else {
            ParentKind::OrganizationalUnit
        };
        self.parents.lock().unwrap().push((
            id.to_string(),
            ParentRef {
                id: parent_id.to_string(),
                kind,
            },
        ));
        self
    }

    pub fn with_tags(self, id: &str, tags: Vec<Tag>) -> Self {
        self.tags.lock().unwrap().push((id.to_string(), tags));
        self
    }

    pub fn with_tags_error(self) -> Self {
        self.tags_fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn list_accounts_calls(&self) -> usize {
        self.list_accounts_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> ServiceResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("organizations", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrgDirectory for FakeDirectory {
    async fn list_roots(&self) -> ServiceResult<Vec<OrgNode>> {
        self.check()?;
        Ok(vec![OrgNode::new("r-root", "Root")])
    }

    async fn list_organizational_units(&self, parent_id: &str) -> ServiceResult<Vec<OrgNode>> {
        self.check()?;
        Ok(match parent_id {
            "r-root" => vec![
                OrgNode::new("ou-eng", "Engineering"),
                OrgNode::new("ou-sandbox", "Sandbox"),
            ],
            "ou-eng" => vec![OrgNode::new("ou-platform", "Platform")],
            _ => Vec::new(),
        })
    }

    async fn list_parents(&self, child_id: &str) -> ServiceResult<Vec<ParentRef>> {
        self.check()?;
        Ok(self
            .parents
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == child_id)
            .map(|(_, parent)| parent.clone())
            .collect())
    }

    async fn list_accounts(&self) -> ServiceResult<Vec<OrgAccount>> {
        self.list_accounts_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn list_tags(&self, resource_id: &str) -> ServiceResult<Vec<Tag>> {
        self.check()?;
        if self.tags_fail.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("organizations", "access denied"));
        }
        Ok(self
            .tags
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == resource_id)
            .map(|(_, tags)| tags.clone())
            .unwrap_or_default())
    }
}

// =============================================================================
// Provisioning catalog
// =============================================================================

/// Catalog offering the account-factory product. Describe calls return the
/// queued statuses in order, repeating the last one.
pub struct FakeCatalog {
    principals: Mutex<Vec<String>>,
    statuses: Mutex<VecDeque<AccountStatus>>,
    outputs: Mutex<Vec<ProvisionedOutput>>,
    has_product: AtomicBool,
    provision_fails: AtomicBool,
    associate_fails: AtomicBool,
    provisions: Mutex<Vec<ProvisionInput>>,
    associate_calls: AtomicUsize,
    describe_calls: AtomicUsize,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            principals: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::from([AccountStatus::UnderChange])),
            outputs: Mutex::new(vec![ProvisionedOutput {
                key: "AccountId".to_string(),
                value: Some(NEW_ACCOUNT_ID.to_string()),
            }]),
            has_product: AtomicBool::new(true),
            provision_fails: AtomicBool::new(false),
            associate_fails: AtomicBool::new(false),
            provisions: Mutex::new(Vec::new()),
            associate_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(self, statuses: Vec<AccountStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_principal(self, arn: &str) -> Self {
        self.principals.lock().unwrap().push(arn.to_string());
        self
    }

    pub fn with_outputs(self, outputs: Vec<ProvisionedOutput>) -> Self {
        *self.outputs.lock().unwrap() = outputs;
        self
    }

    pub fn without_product(self) -> Self {
        self.has_product.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_provision_error(self) -> Self {
        self.provision_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_associate_error(self) -> Self {
        self.associate_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn provisions(&self) -> Vec<ProvisionInput> {
        self.provisions.lock().unwrap().clone()
    }

    pub fn associate_calls(&self) -> usize {
        self.associate_calls.load(Ordering::SeqCst)
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisioningCatalog for FakeCatalog {
    async fn search_products_as_admin(&self, owner: &str) -> ServiceResult<Vec<ProductSummary>> {
        if owner != "AWS Control Tower" || !self.has_product.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(vec![
            ProductSummary {
                id: "prod-other".to_string(),
                name: "Something Else".to_string(),
            },
            ProductSummary {
                id: PRODUCT_ID.to_string(),
                name: "AWS Control Tower Account Factory".to_string(),
            },
        ])
    }

    async fn list_portfolios_for_product(
        &self,
        _product_id: &str,
    ) -> ServiceResult<Vec<PortfolioSummary>> {
        Ok(vec![
            PortfolioSummary {
                id: "port-shared".to_string(),
                provider_name: Some("Someone".to_string()),
            },
            PortfolioSummary {
                id: PORTFOLIO_ID.to_string(),
                provider_name: Some("AWS Control Tower".to_string()),
            },
        ])
    }

    async fn list_principals_for_portfolio(&self, _portfolio_id: &str) -> ServiceResult<Vec<String>> {
        Ok(self.principals.lock().unwrap().clone())
    }

    async fn associate_principal_with_portfolio(
        &self,
        _portfolio_id: &str,
        principal_arn: &str,
    ) -> ServiceResult<()> {
        self.associate_calls.fetch_add(1, Ordering::SeqCst);
        if self.associate_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("servicecatalog", "access denied"));
        }
        self.principals.lock().unwrap().push(principal_arn.to_string());
        Ok(())
    }

    async fn list_provisioning_artifacts(&self, _product_id: &str) -> ServiceResult<Vec<String>> {
        Ok(vec!["pa-old".to_string(), "pa-latest".to_string()])
    }

    async fn provision_product(&self, input: &ProvisionInput) -> ServiceResult<String> {
        if self.provision_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("servicecatalog", "limit exceeded"));
        }
        self.provisions.lock().unwrap().push(input.clone());
        Ok(PROVISIONED_PRODUCT_ID.to_string())
    }

    async fn describe_provisioned_product(
        &self,
        _provisioned_product_id: &str,
    ) -> ServiceResult<ProvisionedProductDetail> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        }
        .unwrap_or(AccountStatus::UnderChange);

        let message = if status == AccountStatus::Error {
            "Account creation failed".to_string()
        } else {
            String::new()
        };
        Ok(ProvisionedProductDetail { status, message })
    }

    async fn provisioned_product_outputs(
        &self,
        _provisioned_product_id: &str,
    ) -> ServiceResult<Vec<ProvisionedOutput>> {
        Ok(self.outputs.lock().unwrap().clone())
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub struct Harness {
    pub directory: Arc<FakeDirectory>,
    pub catalog: Arc<FakeCatalog>,
    pub store: Arc<InMemoryAccountStore>,
    pub resolver: Arc<OrgUnitResolver>,
    pub validator: Arc<RequestValidator>,
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub poller: Arc<StatusPoller>,
    pub reconciler: Arc<Reconciler>,
    pub workflow: InlineWorkflow,
}

impl Harness {
    pub fn new(directory: FakeDirectory, catalog: FakeCatalog) -> Self {
        let directory = Arc::new(directory);
        let catalog = Arc::new(catalog);
        let store = Arc::new(InMemoryAccountStore::new());

        let resolver = Arc::new(OrgUnitResolver::new(directory.clone()));
        let validator = Arc::new(RequestValidator::new(directory.clone(), store.clone()));
        let orchestrator = Arc::new(ProvisioningOrchestrator::new(
            catalog.clone(),
            store.clone(),
            ProvisioningConfig::new(PRINCIPAL_ARN).with_association_cooldown(Duration::ZERO),
        ));
        let poller = Arc::new(StatusPoller::new(catalog.clone()));
        let reconciler = Arc::new(Reconciler::new(catalog.clone(), store.clone()));
        let workflow = InlineWorkflow::new(
            validator.clone(),
            orchestrator.clone(),
            poller.clone(),
            reconciler.clone(),
            WorkflowConfig {
                poll_interval: Duration::from_millis(1),
                max_poll_attempts: 5,
            },
        );

        Self {
            directory,
            catalog,
            store,
            resolver,
            validator,
            orchestrator,
            poller,
            reconciler,
            workflow,
        }
    }

    pub fn default_setup() -> Self {
        Self::new(FakeDirectory::new(), FakeCatalog::new())
    }
}

/// A complete, already-normalized workflow payload.
pub fn payload(email: &str, name: &str) -> Value {
    json!({
        "AccountEmail": email,
        "AccountName": name,
        "OrgUnit": "Engineering/Platform",
        "SSOUserEmail": "sso@co.com",
        "SSOUserFirstName": "Jane",
        "SSOUserLastName": "Doe",
        "Status": "Requested",
        "RequestID": "0b7c6a0e-5f1b-4a3b-9a57-3c1d2e4f5a6b"
    })
}
