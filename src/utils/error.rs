use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::payments::GatewayError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

/// Error taxonomy used consistently across the workflows. Each variant maps
/// to one wire error code and one HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Store error")]
    Store(#[from] StoreError),

    #[error("Payment gateway error")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            AppError::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store(_) | AppError::Gateway(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "invalid-argument",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::PermissionDenied(_) => "permission-denied",
            AppError::NotFound(_) => "not-found",
            AppError::FailedPrecondition(_) => "failed-precondition",
            AppError::ResourceExhausted(_) => "resource-exhausted",
            AppError::Store(_) | AppError::Gateway(_) | AppError::Internal(_) => "internal",
        }
    }

    fn log(&self) {
        match self {
            AppError::Store(e) => error!(error = ?e, "store error"),
            AppError::Gateway(e) => error!(error = ?e, "payment gateway error"),
            AppError::Internal(msg) => error!(message = %msg, "internal error"),
            other => warn!(code = other.code(), message = %other, "request rejected"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Internal failure details stay in the logs.
        let public_message = match &self {
            AppError::InvalidArgument(msg)
            | AppError::Unauthenticated(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg)
            | AppError::FailedPrecondition(msg)
            | AppError::ResourceExhausted(msg) => msg.clone(),
            AppError::Store(_) | AppError::Gateway(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        };

        error_response(code, public_message, status)
    }
}
