//! crates/lms_core/src/error.rs
//!
//! The error type returned by every workflow operation.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// No live invitation matches the submitted token and email.
    #[error("Invalid or expired invitation")]
    InvalidInvitation,

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Covers both a wrong code and an already-used one.
    #[error("Invalid OTP or OTP already used")]
    InvalidOtp,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("User not found")]
    AccountNotFound,

    #[error("Failed to deliver notification: {0}")]
    Delivery(String),

    #[error("Service Port Error: {0}")]
    Port(PortError),
}

impl From<PortError> for WorkflowError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => WorkflowError::NotFound(what),
            PortError::Conflict(what) => WorkflowError::Conflict(what),
            PortError::Unauthorized => WorkflowError::Unauthenticated,
            other => WorkflowError::Port(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
