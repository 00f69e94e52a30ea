//! Error types for the request API and the stage commands.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use vending_core::StageError;
use vending_provisioning::{IntakeError, ServiceError};

use crate::config::ConfigError;

/// Error response format for API errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Request API error.
#[derive(Debug)]
pub struct ApiError(pub IntakeError);

impl From<IntakeError> for ApiError {
    fn from(error: IntakeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            IntakeError::MissingFields(_)
            | IntakeError::InvalidOrgUnit(_)
            | IntakeError::MissingLookupKey => (StatusCode::BAD_REQUEST, "validation_error"),
            IntakeError::DuplicateName | IntakeError::AlreadyExists => {
                (StatusCode::CONFLICT, "conflict")
            }
            IntakeError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            IntakeError::Store(e) => {
                tracing::error!(error = %e, "Account store error");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "internal_error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                    }),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Stage command failures.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The stage failed; its payload goes to the workflow engine.
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stage commands.
pub type CommandResult<T> = Result<T, CommandError>;

impl CommandError {
    /// Process exit code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Stage(_) => 1,
            _ => 2,
        }
    }

    /// Report the failure. Stage failures print their payload on stdout for
    /// the caller; everything else goes to stderr.
    pub fn print(&self) {
        match self {
            Self::Stage(e) => println!("{}", e.to_payload()),
            other => eprintln!("Error: {other}"),
        }
    }
}
