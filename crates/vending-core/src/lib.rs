//! Account Vending Core Library
//!
//! Shared types for the account vending workflow.
//!
//! # Modules
//!
//! - [`request`] - The account request record and its stored field names
//! - [`status`] - Status vocabulary (`Requested`, `IN_PROCESSING`, `ACTIVE`, ...)
//! - [`error`] - Structured stage errors carried to the compensation sink
//!
//! # Example
//!
//! ```
//! use vending_core::{AccountRequest, AccountStatus, StageError, StageErrorKind};
//!
//! let request = AccountRequest {
//!     account_email: "dev@co.com".to_string(),
//!     status: Some(AccountStatus::Requested),
//!     ..AccountRequest::default()
//! };
//!
//! let error = StageError::new(
//!     StageErrorKind::InvalidFormat,
//!     "Invalid e-mail format",
//!     Some(request.account_email.as_str()),
//! );
//! assert_eq!(error.account_email, "dev@co.com");
//! ```

pub mod error;
pub mod request;
pub mod status;

pub use error::{StageError, StageErrorKind, StageResult, UNKNOWN_EMAIL};
pub use request::{fields, timestamp, AccountRequest, Tag};
pub use status::AccountStatus;
