//! # Error Taxonomy
//!
//! [`ErrorKind`] is the closed set of rejection kinds shared by every HTTP
//! surface in the workspace. Each API crate maps its own `thiserror` enum onto
//! a kind and renders an [`ErrorBody`].
//!
//! [`ValidationError`] covers malformed domain input caught at construction
//! time (identifiers, amounts, status and role names, pagination bounds).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection kinds. Every rejection carries exactly one of these plus a
/// human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No credential where one is required.
    Unauthorized,
    /// Credential present but insufficient, invalid, or expired; or a
    /// business rule denied the action.
    Forbidden,
    /// No matching route, order, or status.
    NotFound,
    /// Requested status is not reachable from the current status.
    InvalidTransition,
    /// A concurrent update won the race. Retryable by the caller.
    Conflict,
    /// Backend unreachable or timed out.
    BadGateway,
    /// Malformed input.
    ValidationError,
    /// Unexpected fault. The message is never shown to clients.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Conflict => "CONFLICT",
            Self::BadGateway => "BAD_GATEWAY",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InvalidTransition | Self::Conflict => 409,
            Self::BadGateway => 502,
            Self::ValidationError => 422,
            Self::Internal => 500,
        }
    }
}

/// Structured JSON error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "INVALID_TRANSITION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: kind.code().to_string(),
                message: message.into(),
            },
        }
    }
}

/// Validation errors for domain input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),

    #[error("{kind} exceeds {max} characters")]
    IdentifierTooLong { kind: &'static str, max: usize },

    #[error("invalid order id: \"{0}\"")]
    InvalidOrderId(String),

    #[error("unknown role: \"{0}\"")]
    UnknownRole(String),

    #[error("unknown order status: \"{0}\"")]
    UnknownStatus(String),

    #[error("amount must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("{0}")]
    Field(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_code() {
        let kinds = [
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::NotFound,
            ErrorKind::InvalidTransition,
            ErrorKind::Conflict,
            ErrorKind::BadGateway,
            ErrorKind::ValidationError,
            ErrorKind::Internal,
        ];
        let mut codes: Vec<_> = kinds.iter().map(ErrorKind::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn authorization_kinds_are_distinct_from_gateway_failures() {
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::BadGateway.http_status(), 502);
    }

    #[test]
    fn error_body_serializes_code_and_message() {
        let body = ErrorBody::new(ErrorKind::InvalidTransition, "cancelled is terminal");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "INVALID_TRANSITION");
        assert_eq!(json["error"]["message"], "cancelled is terminal");
    }
}
