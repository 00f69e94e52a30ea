//! Bootstrap import of accounts already present in the organization.
//!
//! Organization-sourced fields are overwritten on every run. Request-lifecycle
//! fields (`RequestID`, `CreatedAt`, SSO fields) are only written when absent,
//! so running the import again never clobbers workflow history.

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use vending_core::{fields, timestamp, Tag};

use crate::org_units::OrgUnitResolver;
use crate::ports::{AccountStore, OrgAccount, OrgDirectory, RecordUpdate, ServiceResult};

/// Counts for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapSummary {
    pub inserted: usize,
    pub failed: usize,
}

/// Request id given to imported accounts.
#[must_use]
pub fn bootstrap_request_id(account_id: &str) -> String {
    format!("bootstrap-{account_id}")
}

/// Update applied for one imported account.
#[must_use]
pub fn import_update(account: &OrgAccount, org_unit: &str, tags: &[Tag]) -> RecordUpdate {
    let created_at = account
        .joined_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(timestamp);
    let tags: Vec<Value> = tags
        .iter()
        .map(|t| json!({ "Key": t.key, "Value": t.value }))
        .collect();

    RecordUpdate::new()
        .set(fields::ACCOUNT_NAME, account.name.as_str())
        .set(fields::ACCOUNT_ID, account.id.as_str())
        .set(fields::STATUS, account.status.as_str())
        .set(fields::ORG_UNIT, org_unit)
        .set(fields::TAGS, tags)
        .set_if_absent(fields::SSO_USER_EMAIL, "")
        .set_if_absent(fields::SSO_USER_FIRST_NAME, "")
        .set_if_absent(fields::SSO_USER_LAST_NAME, "")
        .set_if_absent(fields::REQUEST_ID, bootstrap_request_id(&account.id))
        .set_if_absent(fields::CREATED_AT, created_at)
        .touch()
}

/// Imports every organization account into the store.
pub struct BootstrapJob {
    directory: Arc<dyn OrgDirectory>,
    resolver: Arc<OrgUnitResolver>,
    store: Arc<dyn AccountStore>,
}

impl BootstrapJob {
    pub fn new(
        directory: Arc<dyn OrgDirectory>,
        resolver: Arc<OrgUnitResolver>,
        store: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            directory,
            resolver,
            store,
        }
    }

    /// Run the import. Only a failure to list accounts aborts the run;
    /// per-account failures are counted.
    #[instrument(skip(self))]
    pub async fn run(&self) -> ServiceResult<BootstrapSummary> {
        let accounts = self.directory.list_accounts().await?;
        info!(accounts = accounts.len(), "Importing organization accounts");

        let mut summary = BootstrapSummary::default();
        for account in &accounts {
            let org_unit = self.resolver.resolve_for_account(&account.id).await;
            let tags = match self.directory.list_tags(&account.id).await {
                Ok(tags) => tags,
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "Failed to read account tags");
                    Vec::new()
                }
            };

            let email = account.email.to_lowercase();
            match self
                .store
                .update(&email, import_update(account, &org_unit, &tags))
                .await
            {
                Ok(()) => summary.inserted += 1,
                Err(e) => {
                    error!(account_id = %account.id, error = %e, "Failed to import account");
                    summary.failed += 1;
                }
            }
        }

        info!(
            inserted = summary.inserted,
            failed = summary.failed,
            "Bootstrap import complete"
        );
        Ok(summary)
    }
}
