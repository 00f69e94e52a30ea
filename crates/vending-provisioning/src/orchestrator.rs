//! Provisioning orchestration stage.
//!
//! Locates the account-factory product, makes sure the workflow principal may
//! launch it, starts provisioning with the request id as idempotency token and
//! persists the correlation identifiers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use vending_core::{fields, AccountRequest, AccountStatus, StageError, StageErrorKind, StageResult};

use crate::ports::{
    AccountStore, ProvisionInput, ProvisioningCatalog, ProvisioningParameter, RecordUpdate,
    ServiceResult,
};

/// Owner of the account-factory product.
pub const DEFAULT_PRODUCT_OWNER: &str = "AWS Control Tower";
/// Name of the account-factory product.
pub const DEFAULT_PRODUCT_NAME: &str = "AWS Control Tower Account Factory";
/// Provider name of the portfolio offering the product.
pub const DEFAULT_PORTFOLIO_PROVIDER: &str = "AWS Control Tower";
/// Settle time after a new principal association.
pub const DEFAULT_ASSOCIATION_COOLDOWN: Duration = Duration::from_secs(10);

/// Catalog parameter key for the organizational unit.
pub const ORG_UNIT_PARAMETER: &str = "ManagedOrganizationalUnit";

/// Catalog lookup settings.
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    pub product_owner: String,
    pub product_name: String,
    pub portfolio_provider: String,
    pub principal_arn: String,
    pub association_cooldown: Duration,
}

impl ProvisioningConfig {
    pub fn new(principal_arn: impl Into<String>) -> Self {
        Self {
            product_owner: DEFAULT_PRODUCT_OWNER.to_string(),
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            portfolio_provider: DEFAULT_PORTFOLIO_PROVIDER.to_string(),
            principal_arn: principal_arn.into(),
            association_cooldown: DEFAULT_ASSOCIATION_COOLDOWN,
        }
    }

    #[must_use]
    pub fn with_association_cooldown(mut self, cooldown: Duration) -> Self {
        self.association_cooldown = cooldown;
        self
    }
}

/// Name under which the product instance is provisioned.
#[must_use]
pub fn provisioned_product_name(account_name: &str) -> String {
    format!("AccountLaunch-{account_name}")
}

/// Provisioning parameters for a request.
#[must_use]
pub fn provisioning_parameters(request: &AccountRequest) -> Vec<ProvisioningParameter> {
    vec![
        ProvisioningParameter::new(fields::ACCOUNT_NAME, &request.account_name),
        ProvisioningParameter::new(fields::ACCOUNT_EMAIL, &request.account_email),
        ProvisioningParameter::new(ORG_UNIT_PARAMETER, &request.org_unit),
        ProvisioningParameter::new(fields::SSO_USER_EMAIL, &request.sso_user_email),
        ProvisioningParameter::new(fields::SSO_USER_FIRST_NAME, &request.sso_user_first_name),
        ProvisioningParameter::new(fields::SSO_USER_LAST_NAME, &request.sso_user_last_name),
    ]
}

/// Second workflow stage.
pub struct ProvisioningOrchestrator {
    catalog: Arc<dyn ProvisioningCatalog>,
    store: Arc<dyn AccountStore>,
    config: ProvisioningConfig,
}

impl ProvisioningOrchestrator {
    pub fn new(
        catalog: Arc<dyn ProvisioningCatalog>,
        store: Arc<dyn AccountStore>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Start provisioning for a validated request.
    ///
    /// Correlation fields are persisted before an `ERROR` status is reported,
    /// so a failed request stays traceable until compensation removes it.
    #[instrument(skip_all, fields(account_email = %request.account_email))]
    pub async fn provision(&self, mut request: AccountRequest) -> StageResult<AccountRequest> {
        let email = request.account_email.clone();
        let fail = |kind: StageErrorKind, message: String| StageError::new(kind, message, Some(&email));

        let product_id = match self.find_product_id().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(fail(
                    StageErrorKind::ProductNotFound,
                    format!("Product '{}' not found", self.config.product_name),
                ))
            }
            Err(e) => {
                return Err(fail(
                    StageErrorKind::ProductNotFound,
                    format!("Product lookup failed: {e}"),
                ))
            }
        };

        let portfolio_id = match self.find_portfolio_id(&product_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(fail(
                    StageErrorKind::ProductNotFound,
                    format!(
                        "No portfolio from '{}' offers product {product_id}",
                        self.config.portfolio_provider
                    ),
                ))
            }
            Err(e) => {
                return Err(fail(
                    StageErrorKind::ProductNotFound,
                    format!("Portfolio lookup failed: {e}"),
                ))
            }
        };

        self.ensure_principal_associated(&portfolio_id)
            .await
            .map_err(|e| {
                fail(
                    StageErrorKind::PrincipalAssociationFailed,
                    format!("Failed to associate principal with portfolio {portfolio_id}: {e}"),
                )
            })?;

        let artifact_id = match self.catalog.list_provisioning_artifacts(&product_id).await {
            Ok(artifacts) => match artifacts.last() {
                Some(id) => id.clone(),
                None => {
                    return Err(fail(
                        StageErrorKind::ProductNotFound,
                        format!("Product {product_id} has no provisioning artifacts"),
                    ))
                }
            },
            Err(e) => {
                return Err(fail(
                    StageErrorKind::ProductNotFound,
                    format!("Artifact lookup failed: {e}"),
                ))
            }
        };

        let input = ProvisionInput {
            product_id: product_id.clone(),
            provisioning_artifact_id: artifact_id.clone(),
            provisioned_product_name: provisioned_product_name(&request.account_name),
            parameters: provisioning_parameters(&request),
            provision_token: request.request_id.clone(),
        };

        let provisioned_product_id = self.catalog.provision_product(&input).await.map_err(|e| {
            error!(error = %e, "Provisioning call failed");
            fail(
                StageErrorKind::ProvisioningError,
                format!("Provisioning call failed: {e}"),
            )
        })?;

        let (status, message) = match self
            .catalog
            .describe_provisioned_product(&provisioned_product_id)
            .await
        {
            Ok(detail) => (detail.status, detail.message),
            Err(e) => (AccountStatus::Error, e.to_string()),
        };
        let status = match status {
            AccountStatus::UnderChange => AccountStatus::InProcessing,
            other => other,
        };

        let update = RecordUpdate::new()
            .set(fields::STATUS, status.as_str())
            .set(fields::PROVISIONED_PRODUCT_ID, provisioned_product_id.as_str())
            .set(fields::PROVISIONED_PRODUCT_NAME, input.provisioned_product_name.as_str())
            .set(fields::PRODUCT_ID, product_id.as_str())
            .set(fields::PROVISIONING_ARTIFACT_ID, artifact_id.as_str())
            .set(fields::PORTFOLIO_ID, portfolio_id.as_str())
            .set(fields::PRINCIPAL_ARN, self.config.principal_arn.as_str())
            .touch();

        self.store.update(&email, update).await.map_err(|e| {
            fail(
                StageErrorKind::Unexpected,
                format!("Failed to persist provisioning state: {e}"),
            )
        })?;

        if status == AccountStatus::Error {
            warn!(provisioned_product_id = %provisioned_product_id, message = %message, "Provisioning reported an error");
            return Err(fail(
                StageErrorKind::ProvisioningError,
                format!("Provisioning failed: {message}"),
            ));
        }

        info!(
            provisioned_product_id = %provisioned_product_id,
            status = %status,
            "Provisioning started"
        );

        request.status = Some(status);
        request.provisioned_product_id = Some(provisioned_product_id);
        request.provisioned_product_name = Some(input.provisioned_product_name);
        request.product_id = Some(product_id);
        request.provisioning_artifact_id = Some(artifact_id);
        request.portfolio_id = Some(portfolio_id);
        request.principal_arn = Some(self.config.principal_arn.clone());
        request.provisioning = Some(true);
        request.pp_message = Some(message);
        Ok(request)
    }

    async fn find_product_id(&self) -> ServiceResult<Option<String>> {
        let products = self
            .catalog
            .search_products_as_admin(&self.config.product_owner)
            .await?;
        Ok(products
            .into_iter()
            .find(|p| p.name == self.config.product_name)
            .map(|p| p.id))
    }

    async fn find_portfolio_id(&self, product_id: &str) -> ServiceResult<Option<String>> {
        let portfolios = self.catalog.list_portfolios_for_product(product_id).await?;
        Ok(portfolios
            .into_iter()
            .find(|p| p.provider_name.as_deref() == Some(self.config.portfolio_provider.as_str()))
            .map(|p| p.id))
    }

    /// Associate the principal if it is not yet associated. Returns whether a
    /// new association was made.
    async fn ensure_principal_associated(&self, portfolio_id: &str) -> ServiceResult<bool> {
        let principals = self.catalog.list_principals_for_portfolio(portfolio_id).await?;
        if principals.iter().any(|arn| *arn == self.config.principal_arn) {
            return Ok(false);
        }

        self.catalog
            .associate_principal_with_portfolio(portfolio_id, &self.config.principal_arn)
            .await?;
        info!(
            portfolio_id = %portfolio_id,
            cooldown_secs = self.config.association_cooldown.as_secs(),
            "Associated principal with portfolio"
        );
        tokio::time::sleep(self.config.association_cooldown).await;
        Ok(true)
    }
}
