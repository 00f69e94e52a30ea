//! Front-door intake.
//!
//! Accepts new account requests and answers lookups. Creating a request only
//! inserts a `Requested` record; the change feed picks it up from there.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use vending_core::{timestamp, AccountRequest, AccountStatus, Tag};

use crate::org_units::OrgUnitResolver;
use crate::ports::{AccountStore, StoreError};
use crate::validation::format_name;

/// Intake errors. Each maps to one client-facing message.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("AccountName already exists")]
    DuplicateName,

    #[error("Invalid OrgUnit: {0}")]
    InvalidOrgUnit(String),

    #[error("Account already exists")]
    AlreadyExists,

    #[error("Account not found")]
    NotFound,

    #[error("Provide accountEmail or accountId")]
    MissingLookupKey,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateAccountBody {
    pub account_email: Option<String>,
    pub account_name: Option<String>,
    #[serde(rename = "SSOUserEmail")]
    pub sso_user_email: Option<String>,
    #[serde(rename = "SSOUserFirstName")]
    pub sso_user_first_name: Option<String>,
    #[serde(rename = "SSOUserLastName")]
    pub sso_user_last_name: Option<String>,
    pub org_unit: Option<String>,
    pub tags: Vec<Tag>,
}

impl CreateAccountBody {
    /// Required fields that are absent or blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("AccountEmail", &self.account_email),
            ("AccountName", &self.account_name),
            ("SSOUserEmail", &self.sso_user_email),
            ("SSOUserFirstName", &self.sso_user_first_name),
            ("SSOUserLastName", &self.sso_user_last_name),
            ("OrgUnit", &self.org_unit),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Front-door service.
pub struct AccountIntake {
    store: Arc<dyn AccountStore>,
    resolver: Arc<OrgUnitResolver>,
}

impl AccountIntake {
    pub fn new(store: Arc<dyn AccountStore>, resolver: Arc<OrgUnitResolver>) -> Self {
        Self { store, resolver }
    }

    /// Create a `Requested` record.
    #[instrument(skip_all)]
    pub async fn create(&self, body: CreateAccountBody) -> Result<AccountRequest, IntakeError> {
        let missing = body.missing_fields();
        if !missing.is_empty() {
            return Err(IntakeError::MissingFields(missing));
        }

        let account_name = trimmed(body.account_name);
        if self.name_taken(&account_name).await? {
            warn!(account_name = %account_name, "Duplicate account name");
            return Err(IntakeError::DuplicateName);
        }

        let org_unit = trimmed(body.org_unit);
        if !self.resolver.path_exists(&org_unit).await {
            return Err(IntakeError::InvalidOrgUnit(org_unit));
        }

        let now = timestamp();
        let record = AccountRequest {
            account_email: trimmed(body.account_email).to_lowercase(),
            account_name,
            sso_user_email: trimmed(body.sso_user_email).to_lowercase(),
            sso_user_first_name: format_name(&trimmed(body.sso_user_first_name)),
            sso_user_last_name: format_name(&trimmed(body.sso_user_last_name)),
            org_unit,
            status: Some(AccountStatus::Requested),
            request_id: Uuid::new_v4().to_string(),
            tags: body.tags,
            created_at: Some(now.clone()),
            updated_at: Some(now.clone()),
            last_update_date: Some(now),
            ..AccountRequest::default()
        };

        match self.store.insert_new(&record).await {
            Ok(()) => {
                info!(
                    account_email = %record.account_email,
                    request_id = %record.request_id,
                    "Account request accepted"
                );
                Ok(record)
            }
            Err(StoreError::AlreadyExists { .. }) => Err(IntakeError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored names are matched both as submitted and lowercased, since the
    /// validation stage compares lowercased names.
    async fn name_taken(&self, account_name: &str) -> Result<bool, StoreError> {
        if !self.store.find_by_account_name(account_name).await?.is_empty() {
            return Ok(true);
        }
        let lowered = account_name.to_lowercase();
        if lowered != account_name {
            return Ok(!self.store.find_by_account_name(&lowered).await?.is_empty());
        }
        Ok(false)
    }

    /// Look up a record by email (preferred) or account id.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        account_email: Option<&str>,
        account_id: Option<&str>,
    ) -> Result<AccountRequest, IntakeError> {
        let account_email = account_email.map(str::trim).filter(|v| !v.is_empty());
        let account_id = account_id.map(str::trim).filter(|v| !v.is_empty());

        let found = match (account_email, account_id) {
            (Some(email), _) => self.store.get(&email.to_lowercase()).await?,
            (None, Some(id)) => self.store.find_by_account_id(id).await?,
            (None, None) => return Err(IntakeError::MissingLookupKey),
        };
        found.ok_or(IntakeError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_treats_blank_as_missing() {
        let body = CreateAccountBody {
            account_email: Some("a@co.com".into()),
            account_name: Some("   ".into()),
            sso_user_email: Some("s@co.com".into()),
            sso_user_first_name: Some("Jane".into()),
            ..CreateAccountBody::default()
        };
        assert_eq!(
            body.missing_fields(),
            vec!["AccountName", "SSOUserLastName", "OrgUnit"]
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            IntakeError::MissingFields(vec!["OrgUnit", "AccountName"]).to_string(),
            "Missing fields: OrgUnit, AccountName"
        );
        assert_eq!(
            IntakeError::InvalidOrgUnit("Sales".into()).to_string(),
            "Invalid OrgUnit: Sales"
        );
    }
}
