//! Account status vocabulary.
//!
//! Statuses are persisted as plain strings. Values produced by the provisioning
//! catalog (`AVAILABLE`, `TAINTED`, ...) or copied from the organization during
//! bootstrap (`SUSPENDED`, ...) are kept verbatim in [`AccountStatus::Other`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an account request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    /// Inserted by the front door, waiting for the workflow.
    Requested,
    /// Provisioning call accepted by the catalog.
    InProcessing,
    /// Transient catalog status observed mid-poll. Never persisted.
    UnderChange,
    /// Account created and its identity recorded.
    Active,
    /// Terminal failure.
    Error,
    /// Any other status string, stored as given.
    Other(String),
}

impl AccountStatus {
    /// Wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Requested => "Requested",
            Self::InProcessing => "IN_PROCESSING",
            Self::UnderChange => "UNDER_CHANGE",
            Self::Active => "ACTIVE",
            Self::Error => "ERROR",
            Self::Other(value) => value,
        }
    }

    /// `ACTIVE` and `ERROR` end the workflow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Error)
    }

    /// Whether this value may be written to storage.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        !matches!(self, Self::UnderChange)
    }
}

impl From<&str> for AccountStatus {
    fn from(value: &str) -> Self {
        match value {
            "Requested" => Self::Requested,
            "IN_PROCESSING" => Self::InProcessing,
            "UNDER_CHANGE" => Self::UnderChange,
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AccountStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<AccountStatus> for String {
    fn from(status: AccountStatus) -> Self {
        match status {
            AccountStatus::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
