//! Workflow stage commands.
//!
//! Each command reads one JSON event (from `--event` or stdin), runs a single
//! stage and prints the JSON result on stdout.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

use vending_aws::AwsAdapters;
use vending_core::AccountRequest;
use vending_provisioning::{
    AccountIntake, BootstrapJob, ChangeDispatcher, InlineWorkflow, OrgUnitResolver,
    ProvisioningOrchestrator, Reconciler, RequestValidator, StatusPoller, StreamBatch,
    WorkflowOutcome,
};

use crate::config::{Config, ConfigError};
use crate::error::CommandResult;

/// Components built from configuration and AWS adapters.
pub struct Services {
    config: Config,
    adapters: AwsAdapters,
}

impl Services {
    pub async fn load(config: Config) -> Self {
        let sdk_config = vending_aws::load_sdk_config(config.aws_region.as_deref()).await;
        let adapters = AwsAdapters::new(
            &sdk_config,
            &config.table_name,
            config.state_machine_arn.as_deref(),
        );
        Self { config, adapters }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resolver(&self) -> Arc<OrgUnitResolver> {
        Arc::new(OrgUnitResolver::new(Arc::new(self.adapters.directory.clone())))
    }

    pub fn intake(&self) -> AccountIntake {
        AccountIntake::new(Arc::new(self.adapters.store.clone()), self.resolver())
    }

    fn validator(&self) -> RequestValidator {
        RequestValidator::new(
            Arc::new(self.adapters.directory.clone()),
            Arc::new(self.adapters.store.clone()),
        )
    }

    fn orchestrator(&self) -> CommandResult<ProvisioningOrchestrator> {
        Ok(ProvisioningOrchestrator::new(
            Arc::new(self.adapters.catalog.clone()),
            Arc::new(self.adapters.store.clone()),
            self.config.provisioning()?,
        ))
    }

    fn poller(&self) -> StatusPoller {
        StatusPoller::new(Arc::new(self.adapters.catalog.clone()))
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::new(self.adapters.catalog.clone()),
            Arc::new(self.adapters.store.clone()),
        )
    }

    fn workflow(&self) -> CommandResult<InlineWorkflow> {
        Ok(InlineWorkflow::new(
            Arc::new(self.validator()),
            Arc::new(self.orchestrator()?),
            Arc::new(self.poller()),
            Arc::new(self.reconciler()),
            self.config.workflow(),
        ))
    }
}

/// Read the event document from a file, or stdin when no path is given.
pub async fn read_event(path: Option<&PathBuf>) -> CommandResult<Value> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

fn emit(value: &impl Serialize) -> CommandResult<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub async fn validate(services: &Services, event: Value) -> CommandResult<()> {
    let request = services.validator().validate(event).await?;
    emit(&request)
}

pub async fn provision(services: &Services, event: Value) -> CommandResult<()> {
    let request: AccountRequest = serde_json::from_value(event)?;
    let request = services.orchestrator()?.provision(request).await?;
    emit(&request)
}

pub async fn check_status(services: &Services, event: Value) -> CommandResult<()> {
    let request: AccountRequest = serde_json::from_value(event)?;
    let request = services.poller().check(request).await?;
    emit(&request)
}

pub async fn finalize(services: &Services, event: Value) -> CommandResult<()> {
    let request: AccountRequest = serde_json::from_value(event)?;
    let request = services.reconciler().finalize(request).await?;
    emit(&request)
}

pub async fn compensate(services: &Services, event: Value) -> CommandResult<()> {
    let ack = services.reconciler().compensate(&event).await;
    emit(&ack)
}

pub async fn dispatch(services: &Services, event: Value) -> CommandResult<()> {
    let batch: StreamBatch = serde_json::from_value(event)?;
    let Some(launcher) = services.adapters.launcher.clone() else {
        return Err(ConfigError::MissingVar("SFN_ARN".to_string()).into());
    };
    let summary = ChangeDispatcher::new(Arc::new(launcher)).dispatch(&batch).await;
    emit(&summary)
}

pub async fn bootstrap(services: &Services) -> CommandResult<()> {
    let directory = Arc::new(services.adapters.directory.clone());
    let job = BootstrapJob::new(
        directory.clone(),
        Arc::new(OrgUnitResolver::new(directory)),
        Arc::new(services.adapters.store.clone()),
    );
    let summary = job.run().await?;
    emit(&summary)
}

/// Run every stage in-process for one payload.
pub async fn run_workflow(services: &Services, event: Value) -> CommandResult<()> {
    match services.workflow()?.run(event).await {
        WorkflowOutcome::Completed(request) => {
            info!(account_email = %request.account_email, "Workflow completed");
            emit(&request)
        }
        WorkflowOutcome::Compensated(ack) => emit(&ack),
    }
}
