//! AWS Service Catalog provisioning catalog.

use async_trait::async_trait;
use aws_sdk_servicecatalog::error::DisplayErrorContext;
use aws_sdk_servicecatalog::types::{
    PrincipalType, ProductViewFilterBy, ProvisioningParameter as SdkParameter,
};
use aws_sdk_servicecatalog::Client;

use vending_core::AccountStatus;
use vending_provisioning::ports::{
    PortfolioSummary, ProductSummary, ProvisionInput, ProvisionedOutput, ProvisionedProductDetail,
    ProvisioningCatalog, ServiceError, ServiceResult,
};

const SERVICE: &str = "servicecatalog";

fn unavailable(error: impl std::error::Error) -> ServiceError {
    ServiceError::unavailable(SERVICE, DisplayErrorContext(error))
}

/// Provisioning catalog backed by AWS Service Catalog.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    client: Client,
}

impl ServiceCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProvisioningCatalog for ServiceCatalog {
    async fn search_products_as_admin(&self, owner: &str) -> ServiceResult<Vec<ProductSummary>> {
        let mut pages = self
            .client
            .search_products_as_admin()
            .filters(ProductViewFilterBy::Owner, vec![owner.to_string()])
            .into_paginator()
            .send();
        let mut products = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            products.extend(page.product_view_details().iter().filter_map(|detail| {
                let summary = detail.product_view_summary()?;
                Some(ProductSummary {
                    id: summary.product_id()?.to_string(),
                    name: summary.name().unwrap_or_default().to_string(),
                })
            }));
        }
        Ok(products)
    }

    async fn list_portfolios_for_product(
        &self,
        product_id: &str,
    ) -> ServiceResult<Vec<PortfolioSummary>> {
        let mut pages = self
            .client
            .list_portfolios_for_product()
            .product_id(product_id)
            .into_paginator()
            .send();
        let mut portfolios = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            portfolios.extend(page.portfolio_details().iter().filter_map(|detail| {
                Some(PortfolioSummary {
                    id: detail.id()?.to_string(),
                    provider_name: detail.provider_name().map(str::to_string),
                })
            }));
        }
        Ok(portfolios)
    }

    async fn list_principals_for_portfolio(&self, portfolio_id: &str) -> ServiceResult<Vec<String>> {
        let mut pages = self
            .client
            .list_principals_for_portfolio()
            .portfolio_id(portfolio_id)
            .into_paginator()
            .send();
        let mut principals = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            principals.extend(
                page.principals()
                    .iter()
                    .filter_map(|p| p.principal_arn().map(str::to_string)),
            );
        }
        Ok(principals)
    }

    async fn associate_principal_with_portfolio(
        &self,
        portfolio_id: &str,
        principal_arn: &str,
    ) -> ServiceResult<()> {
        self.client
            .associate_principal_with_portfolio()
            .portfolio_id(portfolio_id)
            .principal_arn(principal_arn)
            .principal_type(PrincipalType::Iam)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn list_provisioning_artifacts(&self, product_id: &str) -> ServiceResult<Vec<String>> {
        let output = self
            .client
            .list_provisioning_artifacts()
            .product_id(product_id)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(output
            .provisioning_artifact_details()
            .iter()
            .filter_map(|a| a.id().map(str::to_string))
            .collect())
    }

    async fn provision_product(&self, input: &ProvisionInput) -> ServiceResult<String> {
        let parameters = input
            .parameters
            .iter()
            .map(|p| SdkParameter::builder().key(&p.key).value(&p.value).build())
            .collect();

        let output = self
            .client
            .provision_product()
            .product_id(&input.product_id)
            .provisioning_artifact_id(&input.provisioning_artifact_id)
            .provisioned_product_name(&input.provisioned_product_name)
            .set_provisioning_parameters(Some(parameters))
            .provision_token(&input.provision_token)
            .send()
            .await
            .map_err(unavailable)?;

        output
            .record_detail()
            .and_then(|r| r.provisioned_product_id())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::invalid_response(SERVICE, "ProvisionProduct returned no provisioned product id")
            })
    }

    async fn describe_provisioned_product(
        &self,
        provisioned_product_id: &str,
    ) -> ServiceResult<ProvisionedProductDetail> {
        let output = self
            .client
            .describe_provisioned_product()
            .id(provisioned_product_id)
            .send()
            .await
            .map_err(unavailable)?;

        let detail = output.provisioned_product_detail().ok_or_else(|| {
            ServiceError::invalid_response(SERVICE, "DescribeProvisionedProduct returned no detail")
        })?;
        Ok(ProvisionedProductDetail {
            status: detail
                .status()
                .map_or(AccountStatus::Error, |s| AccountStatus::from(s.as_str())),
            message: detail.status_message().unwrap_or_default().to_string(),
        })
    }

    async fn provisioned_product_outputs(
        &self,
        provisioned_product_id: &str,
    ) -> ServiceResult<Vec<ProvisionedOutput>> {
        let output = self
            .client
            .get_provisioned_product_outputs()
            .provisioned_product_id(provisioned_product_id)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(output
            .outputs()
            .iter()
            .filter_map(|o| {
                Some(ProvisionedOutput {
                    key: o.output_key()?.to_string(),
                    value: o.output_value().map(str::to_string),
                })
            })
            .collect())
    }
}
