//! The account request record.
//!
//! One record per requested account, keyed by the lowercase `AccountEmail`.
//! The same shape travels through the workflow as the stage payload, so the
//! serialized field names match the stored attribute names exactly.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::status::AccountStatus;

/// Stored attribute names.
pub mod fields {
    pub const ACCOUNT_EMAIL: &str = "AccountEmail";
    pub const ACCOUNT_NAME: &str = "AccountName";
    pub const ACCOUNT_ID: &str = "AccountId";
    pub const SSO_USER_EMAIL: &str = "SSOUserEmail";
    pub const SSO_USER_FIRST_NAME: &str = "SSOUserFirstName";
    pub const SSO_USER_LAST_NAME: &str = "SSOUserLastName";
    pub const ORG_UNIT: &str = "OrgUnit";
    pub const STATUS: &str = "Status";
    pub const REQUEST_ID: &str = "RequestID";
    pub const PROVISIONED_PRODUCT_ID: &str = "ProvisionedProductId";
    pub const PROVISIONED_PRODUCT_NAME: &str = "ProvisionedProductName";
    pub const PRODUCT_ID: &str = "ProductID";
    pub const PROVISIONING_ARTIFACT_ID: &str = "ProvisioningArtifactID";
    pub const PORTFOLIO_ID: &str = "PortfolioID";
    pub const PRINCIPAL_ARN: &str = "PRINCIPAL_ARN";
    pub const TAGS: &str = "Tags";
    pub const CREATED_AT: &str = "CreatedAt";
    pub const UPDATED_AT: &str = "UpdatedAt";
    pub const LAST_UPDATE_DATE: &str = "LastUpdateDate";

    /// Fields the validation stage requires before anything else runs.
    pub const REQUIRED_FOR_VALIDATION: [&str; 7] = [
        ACCOUNT_NAME,
        ACCOUNT_EMAIL,
        ORG_UNIT,
        SSO_USER_EMAIL,
        SSO_USER_FIRST_NAME,
        SSO_USER_LAST_NAME,
        REQUEST_ID,
    ];
}

/// A key/value tag copied through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An account request as stored and as passed between workflow stages.
///
/// Correlation fields are populated once provisioning starts; `account_id`
/// only on success. The trailing marker fields are set by individual stages
/// on the workflow payload and are never written to storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccountRequest {
    pub account_email: String,
    pub account_name: String,
    #[serde(rename = "SSOUserEmail")]
    pub sso_user_email: String,
    #[serde(rename = "SSOUserFirstName")]
    pub sso_user_first_name: String,
    #[serde(rename = "SSOUserLastName")]
    pub sso_user_last_name: String,
    pub org_unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
    #[serde(rename = "RequestID")]
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_product_name: Option<String>,
    #[serde(rename = "ProductID", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(rename = "ProvisioningArtifactID", skip_serializing_if = "Option::is_none")]
    pub provisioning_artifact_id: Option<String>,
    #[serde(rename = "PortfolioID", skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,
    #[serde(rename = "PRINCIPAL_ARN", skip_serializing_if = "Option::is_none")]
    pub principal_arn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_date: Option<String>,

    // Stage markers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<bool>,
    #[serde(rename = "PP_Message", skip_serializing_if = "Option::is_none")]
    pub pp_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
}

impl AccountRequest {
    /// Drop the stage markers, leaving only stored attributes.
    #[must_use]
    pub fn without_markers(mut self) -> Self {
        self.validation = None;
        self.provisioning = None;
        self.pp_message = None;
        self.check_status = None;
        self.success = None;
        self
    }

    /// The status, treating an absent one as `Requested`.
    #[must_use]
    pub fn status_or_requested(&self) -> AccountStatus {
        self.status.clone().unwrap_or(AccountStatus::Requested)
    }
}

/// Current UTC time in RFC 3339 form, as stored in timestamp fields.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
