//! # Gateway Rejections
//!
//! Every request the gateway refuses to forward ends here. Responses use the
//! shared `{"error": {"code", "message"}}` body. Upstream and internal
//! details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use bazaar_auth::AuthError;
use bazaar_core::{ErrorBody, ErrorKind};

use crate::routes::PathError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no route for {0}")]
    NoRoute(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("access denied: {0}")]
    Denied(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// Backend unreachable, timed out, or its response could not be read.
    #[error("upstream {service}: {reason}")]
    Upstream { service: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRoute(_) => ErrorKind::NotFound,
            Self::Auth(e) => e.kind(),
            Self::Denied(_) => ErrorKind::Forbidden,
            Self::InvalidRequest(_) | Self::Path(_) => ErrorKind::ValidationError,
            Self::Upstream { .. } => ErrorKind::BadGateway,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth(e) => e.public_message(),
            Self::Upstream { service, .. } => format!("service {service} is unavailable"),
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status =
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match kind {
            ErrorKind::Internal => tracing::error!(error = %self, "internal gateway error"),
            ErrorKind::BadGateway => tracing::warn!(error = %self, "upstream failure"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        (status, Json(ErrorBody::new(kind, self.public_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_auth::{ResolverError, TokenError};
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn no_route_is_404() {
        let resp = GatewayError::NoRoute("/nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn missing_token_is_401() {
        let resp = GatewayError::Auth(AuthError::MissingToken).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_403() {
        let resp = GatewayError::Auth(AuthError::Token(TokenError::Expired)).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "token has expired");
    }

    #[tokio::test]
    async fn role_store_outage_is_502() {
        let resp = GatewayError::Auth(AuthError::Resolver(ResolverError::Unavailable(
            "connection refused".into(),
        )))
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(resp).await;
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn upstream_detail_not_exposed() {
        let resp = GatewayError::Upstream {
            service: "catalog".into(),
            reason: "tcp connect error 10.0.0.7:4001".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "BAD_GATEWAY");
        assert_eq!(body["error"]["message"], "service catalog is unavailable");
    }

    #[tokio::test]
    async fn internal_message_hidden() {
        let resp = GatewayError::Internal("secret detail".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn oversized_body_is_422() {
        let resp = GatewayError::InvalidRequest("request body exceeds 10 bytes".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
