//! Step Functions workflow launcher.

use async_trait::async_trait;
use aws_sdk_sfn::error::DisplayErrorContext;
use aws_sdk_sfn::Client;
use serde_json::Value;

use vending_provisioning::ports::{ServiceError, ServiceResult, WorkflowLauncher};

const SERVICE: &str = "stepfunctions";

/// Starts executions of the provisioning state machine.
#[derive(Debug, Clone)]
pub struct StepFunctionsLauncher {
    client: Client,
    state_machine_arn: String,
}

impl StepFunctionsLauncher {
    pub fn new(client: Client, state_machine_arn: impl Into<String>) -> Self {
        Self {
            client,
            state_machine_arn: state_machine_arn.into(),
        }
    }
}

#[async_trait]
impl WorkflowLauncher for StepFunctionsLauncher {
    async fn start_execution(
        &self,
        execution_name: Option<&str>,
        input: &Value,
    ) -> ServiceResult<String> {
        let output = self
            .client
            .start_execution()
            .state_machine_arn(&self.state_machine_arn)
            .set_name(execution_name.map(str::to_string))
            .input(input.to_string())
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(SERVICE, DisplayErrorContext(e)))?;

        Ok(output.execution_arn().to_string())
    }
}
