//! In-process workflow runner.
//!
//! Chains the stages the way the hosted state machine does: validate,
//! provision, poll until settled, finalize; any stage failure goes to
//! compensation. Used for local runs and end-to-end tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use vending_core::{AccountRequest, StageError, StageErrorKind, StageResult};

use crate::orchestrator::ProvisioningOrchestrator;
use crate::poller::StatusPoller;
use crate::ports::{ServiceResult, WorkflowLauncher};
use crate::reconciler::{CompensationAck, Reconciler};
use crate::validation::RequestValidator;

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_poll_attempts: 120,
        }
    }
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Completed(AccountRequest),
    Compensated(CompensationAck),
}

/// Runs the full workflow in-process.
#[derive(Clone)]
pub struct InlineWorkflow {
    validator: Arc<RequestValidator>,
    orchestrator: Arc<ProvisioningOrchestrator>,
    poller: Arc<StatusPoller>,
    reconciler: Arc<Reconciler>,
    config: WorkflowConfig,
}

impl InlineWorkflow {
    pub fn new(
        validator: Arc<RequestValidator>,
        orchestrator: Arc<ProvisioningOrchestrator>,
        poller: Arc<StatusPoller>,
        reconciler: Arc<Reconciler>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            validator,
            orchestrator,
            poller,
            reconciler,
            config,
        }
    }

    /// Run one execution to completion.
    #[instrument(skip_all)]
    pub async fn run(&self, payload: Value) -> WorkflowOutcome {
        match self.run_stages(payload).await {
            Ok(request) => WorkflowOutcome::Completed(request),
            Err(failure) => {
                warn!(error_type = %failure.kind, account_email = %failure.account_email, "Workflow failed");
                WorkflowOutcome::Compensated(self.reconciler.compensate_error(&failure).await)
            }
        }
    }

    async fn run_stages(&self, payload: Value) -> StageResult<AccountRequest> {
        let request = self.validator.validate(payload).await?;
        let mut request = self.orchestrator.provision(request).await?;

        let provisioned_product_id = request.provisioned_product_id.clone().unwrap_or_default();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.poller.poll(&provisioned_product_id).await;
            let settled = outcome.is_settled();
            request = StatusPoller::apply(request, outcome)?;
            if settled {
                break;
            }
            if attempts >= self.config.max_poll_attempts {
                return Err(StageError::new(
                    StageErrorKind::PollQueryFailed,
                    format!("Provisioning still in progress after {attempts} polls"),
                    Some(&request.account_email),
                ));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        self.reconciler.finalize(request).await
    }
}

#[async_trait]
impl WorkflowLauncher for InlineWorkflow {
    async fn start_execution(
        &self,
        execution_name: Option<&str>,
        input: &Value,
    ) -> ServiceResult<String> {
        let execution_id = match execution_name {
            Some(name) => format!("inline-{name}"),
            None => format!("inline-{}", Uuid::new_v4()),
        };

        let workflow = self.clone();
        let input = input.clone();
        let id = execution_id.clone();
        tokio::spawn(async move {
            let outcome = workflow.run(input).await;
            info!(
                execution_id = %id,
                completed = matches!(outcome, WorkflowOutcome::Completed(_)),
                "Inline execution finished"
            );
        });

        Ok(execution_id)
    }
}
