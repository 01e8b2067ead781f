//! HTTP handlers. The service is mounted behind the gateway's `/orders`
//! prefix, which is stripped, so paths here start at `/`.

pub mod orders;
pub mod statuses;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body, mapping rejections to a validation error.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Extract query parameters, mapping rejections to a validation error.
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}
