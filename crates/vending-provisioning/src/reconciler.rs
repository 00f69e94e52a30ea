//! Reconciliation: success finalizer and failure compensation.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use vending_core::{
    fields, AccountRequest, AccountStatus, StageError, StageErrorKind, StageResult, UNKNOWN_EMAIL,
};

use crate::ports::{AccountStore, ProvisioningCatalog, RecordUpdate};

/// Output key carrying the new account's id.
pub const ACCOUNT_ID_OUTPUT: &str = "AccountId";
/// Account id recorded when the output is missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// Acknowledgement returned by compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationAck {
    #[serde(rename = "Success")]
    pub success: String,
    pub account_email: String,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(rename = "Status")]
    pub status: CompensationStatus,
}

/// What compensation did with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompensationStatus {
    /// Record deleted.
    RequestRemoved,
    /// No email in the failure; nothing to delete.
    NothingToRemove,
    /// The delete itself failed.
    RemoveFailed,
}

/// Pull a structured stage error out of a failure event.
///
/// Accepts the engine envelope `{"Error", "Cause"}` where `Cause` is a JSON
/// string whose `errorMessage` is itself the serialized stage error, the
/// `Cause` being the stage error directly, or a bare stage error payload.
#[must_use]
pub fn extract_failure(event: &Value) -> Option<StageError> {
    if event.get("Error").is_some() || event.get("Cause").is_some() {
        let cause = parse_embedded(event.get("Cause")?)?;
        if let Some(inner) = cause.get("errorMessage").and_then(parse_embedded) {
            if let Ok(error) = serde_json::from_value::<StageError>(inner) {
                return Some(error);
            }
        }
        return serde_json::from_value(cause).ok();
    }
    serde_json::from_value(event.clone()).ok()
}

/// A JSON value that may arrive as an encoded string.
fn parse_embedded(value: &Value) -> Option<Value> {
    match value {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        Value::Object(_) => Some(value.clone()),
        _ => None,
    }
}

/// Fourth and fifth workflow stages.
pub struct Reconciler {
    catalog: Arc<dyn ProvisioningCatalog>,
    store: Arc<dyn AccountStore>,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn ProvisioningCatalog>, store: Arc<dyn AccountStore>) -> Self {
        Self { catalog, store }
    }

    /// Record the new account id and mark the request `ACTIVE`.
    ///
    /// Without an `AccountId` output the record is marked `ERROR` with
    /// account id `N/A` and the stage fails.
    #[instrument(skip_all, fields(account_email = %request.account_email))]
    pub async fn finalize(&self, mut request: AccountRequest) -> StageResult<AccountRequest> {
        let email = request.account_email.clone();
        let account_id = match request.provisioned_product_id.as_deref() {
            Some(id) => self.account_id_output(id).await,
            None => None,
        };

        let Some(account_id) = account_id else {
            let update = RecordUpdate::new()
                .set(fields::STATUS, AccountStatus::Error.as_str())
                .set(fields::ACCOUNT_ID, NOT_AVAILABLE)
                .touch();
            if let Err(e) = self.store.update(&email, update).await {
                error!(error = %e, "Failed to mark request as errored");
            }
            return Err(StageError::new(
                StageErrorKind::AccountIdMissing,
                "Provisioned product has no AccountId output",
                Some(&email),
            ));
        };

        let update = RecordUpdate::new()
            .set(fields::STATUS, AccountStatus::Active.as_str())
            .set(fields::ACCOUNT_ID, account_id.as_str())
            .touch();
        self.store.update(&email, update).await.map_err(|e| {
            StageError::new(
                StageErrorKind::Unexpected,
                format!("Failed to record account id: {e}"),
                Some(&email),
            )
        })?;

        info!(account_id = %account_id, "Account provisioned");
        request.status = Some(AccountStatus::Active);
        request.account_id = Some(account_id);
        request.success = Some("True".to_string());
        Ok(request)
    }

    async fn account_id_output(&self, provisioned_product_id: &str) -> Option<String> {
        match self
            .catalog
            .provisioned_product_outputs(provisioned_product_id)
            .await
        {
            Ok(outputs) => outputs
                .into_iter()
                .find(|o| o.key == ACCOUNT_ID_OUTPUT)
                .and_then(|o| o.value)
                .filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read provisioned product outputs");
                None
            }
        }
    }

    /// Compensate a failed execution. Never fails.
    pub async fn compensate(&self, event: &Value) -> CompensationAck {
        match extract_failure(event) {
            Some(failure) => self.compensate_error(&failure).await,
            None => {
                warn!("Failure event carried no structured error");
                CompensationAck {
                    success: "False".to_string(),
                    account_email: UNKNOWN_EMAIL.to_string(),
                    error_type: None,
                    error_message: event.to_string(),
                    status: CompensationStatus::NothingToRemove,
                }
            }
        }
    }

    /// Delete the record named by a stage error.
    #[instrument(skip_all, fields(account_email = %failure.account_email, error_type = %failure.kind))]
    pub async fn compensate_error(&self, failure: &StageError) -> CompensationAck {
        let status = if failure.has_account_email() {
            match self.store.delete(&failure.account_email).await {
                Ok(()) => {
                    info!(error_message = %failure.message, "Removed failed account request");
                    CompensationStatus::RequestRemoved
                }
                Err(e) => {
                    error!(error = %e, "Failed to remove account request");
                    CompensationStatus::RemoveFailed
                }
            }
        } else {
            warn!("No account email on failure; nothing to remove");
            CompensationStatus::NothingToRemove
        };

        CompensationAck {
            success: "False".to_string(),
            account_email: failure.account_email.clone(),
            error_type: Some(failure.kind.as_str().to_string()),
            error_message: failure.message.clone(),
            status,
        }
    }
}
