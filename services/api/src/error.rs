//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use crate::config::ConfigError;
use crate::web::rest::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lms_core::{PortError, WorkflowError};
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core workflows.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The request body or path could not be understood.
    #[error("{0}")]
    BadRequest(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        ApiError::Workflow(err.into())
    }
}

impl ApiError {
    /// The status code this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Workflow(err) => match err {
                WorkflowError::Validation(_)
                | WorkflowError::InvalidInvitation
                | WorkflowError::InvalidOtp
                | WorkflowError::OtpExpired
                | WorkflowError::AccountNotFound => StatusCode::BAD_REQUEST,
                WorkflowError::InvalidCredential | WorkflowError::Unauthenticated => {
                    StatusCode::UNAUTHORIZED
                }
                WorkflowError::Forbidden => StatusCode::FORBIDDEN,
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::Delivery(_) => StatusCode::BAD_GATEWAY,
                WorkflowError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Workflow(WorkflowError::Delivery(detail)) => {
                error!(error = %detail, "Notification delivery failed");
                "Failed to send email".to_string()
            }
            _ if status.is_server_error() => {
                error!(error = %self, "Request failed with an internal error");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// A convenience type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
