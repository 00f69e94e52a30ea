//! AWS adapters for the account vending workflow.
//!
//! Implements the ports of `vending-provisioning` on top of the official AWS
//! SDK crates. All list calls follow pagination to the end.

pub mod attributes;
pub mod dynamodb;
pub mod organizations;
pub mod service_catalog;
pub mod step_functions;

pub use dynamodb::DynamoAccountStore;
pub use organizations::OrganizationsDirectory;
pub use service_catalog::ServiceCatalog;
pub use step_functions::StepFunctionsLauncher;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load shared SDK configuration from the environment, optionally pinning
/// the region.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    let config = loader.load().await;

    tracing::info!(
        region = ?config.region().map(|r| r.as_ref().to_string()),
        "AWS SDK configuration loaded"
    );
    config
}

/// All adapters built from one SDK configuration.
#[derive(Debug, Clone)]
pub struct AwsAdapters {
    pub directory: OrganizationsDirectory,
    pub catalog: ServiceCatalog,
    pub store: DynamoAccountStore,
    pub launcher: Option<StepFunctionsLauncher>,
}

impl AwsAdapters {
    pub fn new(config: &SdkConfig, table: &str, state_machine_arn: Option<&str>) -> Self {
        Self {
            directory: OrganizationsDirectory::new(aws_sdk_organizations::Client::new(config)),
            catalog: ServiceCatalog::new(aws_sdk_servicecatalog::Client::new(config)),
            store: DynamoAccountStore::new(aws_sdk_dynamodb::Client::new(config), table),
            launcher: state_machine_arn.map(|arn| {
                StepFunctionsLauncher::new(aws_sdk_sfn::Client::new(config), arn)
            }),
        }
    }
}
