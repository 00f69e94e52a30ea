//! Provisioning status poller.
//!
//! Reads the current status of a provisioned product and reports it on the
//! workflow payload. The poller never writes storage; the reconciliation stage
//! persists terminal outcomes.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use vending_core::{AccountRequest, AccountStatus, StageError, StageErrorKind, StageResult};

use crate::ports::ProvisioningCatalog;

/// Result of one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: AccountStatus,
    pub message: String,
}

impl PollOutcome {
    /// `UNDER_CHANGE` is transient and leaves the payload status alone.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status != AccountStatus::UnderChange
    }
}

/// Third workflow stage.
pub struct StatusPoller {
    catalog: Arc<dyn ProvisioningCatalog>,
}

impl StatusPoller {
    pub fn new(catalog: Arc<dyn ProvisioningCatalog>) -> Self {
        Self { catalog }
    }

    /// Query the catalog. A failed query is reported as `ERROR` with the
    /// failure text as message.
    #[instrument(skip(self))]
    pub async fn poll(&self, provisioned_product_id: &str) -> PollOutcome {
        match self
            .catalog
            .describe_provisioned_product(provisioned_product_id)
            .await
        {
            Ok(detail) => PollOutcome {
                status: detail.status,
                message: detail.message,
            },
            Err(e) => {
                warn!(error = %e, "Status query failed");
                PollOutcome {
                    status: AccountStatus::Error,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Poll the request's provisioned product and fold the outcome into it.
    pub async fn check(&self, request: AccountRequest) -> StageResult<AccountRequest> {
        let Some(provisioned_product_id) = request.provisioned_product_id.clone() else {
            return Err(StageError::new(
                StageErrorKind::MissingFields,
                "ProvisionedProductId missing from payload",
                Some(&request.account_email),
            ));
        };
        let outcome = self.poll(&provisioned_product_id).await;
        Self::apply(request, outcome)
    }

    /// Fold a poll outcome into the payload. `ERROR` fails the stage.
    pub fn apply(mut request: AccountRequest, outcome: PollOutcome) -> StageResult<AccountRequest> {
        if outcome.status == AccountStatus::Error {
            return Err(StageError::new(
                StageErrorKind::PollQueryFailed,
                format!("Provisioned product reported an error: {}", outcome.message),
                Some(&request.account_email),
            ));
        }

        if outcome.is_settled() {
            info!(
                account_email = %request.account_email,
                status = %outcome.status,
                "Provisioning status settled"
            );
            request.status = Some(outcome.status);
        }
        request.check_status = Some(true);
        Ok(request)
    }
}
