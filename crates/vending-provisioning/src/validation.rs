//! Request validation stage.
//!
//! Normalizes the incoming payload and rejects requests that are incomplete,
//! malformed, already present in the organization, or already being worked on.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{info, instrument, warn};

use vending_core::{fields, AccountRequest, AccountStatus, StageError, StageErrorKind, StageResult};

use crate::ports::{AccountStore, OrgDirectory};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("EMAIL_RE is a valid regex pattern")
});

/// Whether `value` looks like an email address.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// First character uppercase, the rest lowercase.
#[must_use]
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Capitalize each whitespace-separated word.
#[must_use]
pub fn format_name(value: &str) -> String {
    value
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Required fields absent (or null) in a raw payload, in declaration order.
#[must_use]
pub fn missing_fields(payload: &Value) -> Vec<&'static str> {
    fields::REQUIRED_FOR_VALIDATION
        .into_iter()
        .filter(|field| payload.get(field).map_or(true, Value::is_null))
        .collect()
}

/// Lowercase and trim emails and the account name, capitalize SSO names.
pub fn normalize(request: &mut AccountRequest) {
    request.account_email = request.account_email.trim().to_lowercase();
    request.sso_user_email = request.sso_user_email.trim().to_lowercase();
    request.account_name = request.account_name.trim().to_lowercase();
    request.sso_user_first_name = capitalize(request.sso_user_first_name.trim());
    request.sso_user_last_name = capitalize(request.sso_user_last_name.trim());
}

/// First workflow stage.
pub struct RequestValidator {
    directory: Arc<dyn OrgDirectory>,
    store: Arc<dyn AccountStore>,
}

impl RequestValidator {
    pub fn new(directory: Arc<dyn OrgDirectory>, store: Arc<dyn AccountStore>) -> Self {
        Self { directory, store }
    }

    /// Validate and normalize a raw workflow payload.
    ///
    /// Returns the normalized request with the `Validation` marker set.
    /// Validation has no side effects on storage.
    #[instrument(skip_all)]
    pub async fn validate(&self, payload: Value) -> StageResult<AccountRequest> {
        let email_hint = payload
            .get(fields::ACCOUNT_EMAIL)
            .and_then(Value::as_str)
            .map(|e| e.trim().to_lowercase());

        let missing = missing_fields(&payload);
        if !missing.is_empty() {
            warn!(missing = ?missing, "Request is missing required fields");
            return Err(StageError::new(
                StageErrorKind::MissingFields,
                format!("Missing required fields: {}", missing.join(", ")),
                email_hint.as_deref(),
            ));
        }

        let mut request: AccountRequest = serde_json::from_value(payload).map_err(|e| {
            StageError::new(
                StageErrorKind::InvalidFormat,
                format!("Malformed request payload: {e}"),
                email_hint.as_deref(),
            )
        })?;
        normalize(&mut request);
        let email = request.account_email.clone();

        for value in [&request.account_email, &request.sso_user_email] {
            if !is_valid_email(value) {
                return Err(StageError::new(
                    StageErrorKind::InvalidFormat,
                    format!("Invalid e-mail format: {value}"),
                    Some(&email),
                ));
            }
        }

        self.check_organization(&request).await?;
        self.check_not_processing(&request).await?;

        request.validation = Some(true);
        info!(account_email = %email, account_name = %request.account_name, "Request validated");
        Ok(request)
    }

    async fn check_organization(&self, request: &AccountRequest) -> StageResult<()> {
        let email = request.account_email.as_str();
        let accounts = self.directory.list_accounts().await.map_err(|e| {
            StageError::new(
                StageErrorKind::Unexpected,
                format!("Failed to list organization accounts: {e}"),
                Some(email),
            )
        })?;

        let duplicate = accounts.iter().any(|account| {
            account.name.to_lowercase() == request.account_name
                || account.email.to_lowercase() == request.account_email
        });
        if duplicate {
            warn!(account_email = %email, "Account already exists in organization");
            return Err(StageError::new(
                StageErrorKind::DuplicateInOrg,
                format!(
                    "Account name '{}' or e-mail '{}' already exists in the organization",
                    request.account_name, request.account_email
                ),
                Some(email),
            ));
        }
        Ok(())
    }

    async fn check_not_processing(&self, request: &AccountRequest) -> StageResult<()> {
        let email = request.account_email.as_str();
        let existing = self.store.get(email).await.map_err(|e| {
            StageError::new(
                StageErrorKind::Unexpected,
                format!("Failed to read account record: {e}"),
                Some(email),
            )
        })?;

        if let Some(status) = existing.and_then(|record| record.status) {
            if status != AccountStatus::Requested {
                return Err(StageError::new(
                    StageErrorKind::AlreadyProcessing,
                    format!("Request for {email} already processed (status {status})"),
                    Some(email),
                ));
            }
        }
        Ok(())
    }
}
