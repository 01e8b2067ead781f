//! # Application Error
//!
//! Maps domain errors onto the shared [`ErrorKind`] taxonomy and renders the
//! `{"error": {"code", "message"}}` body. Internal details are logged, never
//! returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use bazaar_auth::AuthError;
use bazaar_core::{ErrorBody, ErrorKind, ValidationError};
use bazaar_state::{OrderError, RegistryError, TransitionError};

use crate::state::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(e) => e.kind(),
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth(e) => e.public_message(),
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e.kind() {
            ErrorKind::InvalidTransition => Self::InvalidTransition(e.to_string()),
            ErrorKind::Forbidden => Self::Forbidden(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::ItemsLocked(_) => Self::Forbidden(e.to_string()),
            OrderError::Corrupt(_) => Self::Internal(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound(e.to_string()),
            StoreError::Conflict { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status =
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match kind {
            ErrorKind::Internal => tracing::error!(error = %self, "internal order service error"),
            ErrorKind::BadGateway => tracing::warn!(error = %self, "role store failure"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        (status, Json(ErrorBody::new(kind, self.public_message()))).into_response()
    }
}
