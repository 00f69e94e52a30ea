//! Stage errors.
//!
//! Every workflow stage fails with a [`StageError`]. It always carries the
//! account email so the compensation sink can find the record without
//! re-deriving it from partial state. At the process boundary it serializes to
//! `{"errorType", "errorMessage", "account_email"}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Placeholder email when the payload did not carry one.
pub const UNKNOWN_EMAIL: &str = "unknown";

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageErrorKind {
    // Validation
    MissingFields,
    InvalidFormat,
    DuplicateInOrg,
    AlreadyProcessing,
    // Orchestration
    ProductNotFound,
    PrincipalAssociationFailed,
    ProvisioningError,
    // Polling
    PollQueryFailed,
    // Reconciliation
    AccountIdMissing,
    /// Storage or adapter failure inside a stage.
    Unexpected,
}

impl StageErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingFields => "MissingFields",
            Self::InvalidFormat => "InvalidFormat",
            Self::DuplicateInOrg => "DuplicateInOrg",
            Self::AlreadyProcessing => "AlreadyProcessing",
            Self::ProductNotFound => "ProductNotFound",
            Self::PrincipalAssociationFailed => "PrincipalAssociationFailed",
            Self::ProvisioningError => "ProvisioningError",
            Self::PollQueryFailed => "PollQueryFailed",
            Self::AccountIdMissing => "AccountIdMissing",
            Self::Unexpected => "Unexpected",
        }
    }

    /// Raised by the validation stage.
    #[must_use]
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            Self::MissingFields
                | Self::InvalidFormat
                | Self::DuplicateInOrg
                | Self::AlreadyProcessing
        )
    }
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct StageError {
    #[serde(rename = "errorType")]
    pub kind: StageErrorKind,
    #[serde(rename = "errorMessage")]
    pub message: String,
    #[serde(default = "unknown_email")]
    pub account_email: String,
}

fn unknown_email() -> String {
    UNKNOWN_EMAIL.to_string()
}

/// Result type for workflow stages.
pub type StageResult<T> = Result<T, StageError>;

impl StageError {
    /// Create a stage error. Empty or absent emails become [`UNKNOWN_EMAIL`].
    pub fn new(kind: StageErrorKind, message: impl Into<String>, account_email: Option<&str>) -> Self {
        let account_email = account_email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map_or_else(unknown_email, str::to_string);

        Self {
            kind,
            message: message.into(),
            account_email,
        }
    }

    /// Whether the error carries a real email (compensation has something to delete).
    #[must_use]
    pub fn has_account_email(&self) -> bool {
        self.account_email != UNKNOWN_EMAIL
    }

    /// JSON payload handed to the workflow engine.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "errorType": self.kind.as_str(),
            "errorMessage": self.message,
            "account_email": self.account_email,
        })
    }
}
