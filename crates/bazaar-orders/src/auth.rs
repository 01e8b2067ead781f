//! # Authentication Middleware
//!
//! The service sits behind the gateway but does not trust it blindly: the
//! bearer token is verified again here and the role is resolved fresh from
//! the role store. Health endpoints are mounted outside this middleware.
//!
//! Every authenticated request gets a [`Caller`] in its extensions, which
//! handlers take through the `FromRequestParts` impl.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use bazaar_auth::{authenticate, bearer_token, Identity};
use bazaar_state::Actor;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Identity);

impl Caller {
    /// The caller as the state machine sees it, with the resolved role.
    pub fn actor(&self) -> Actor {
        Actor::new(self.0.subject.clone(), self.0.role)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::Internal("no caller identity in request context".into()))
    }
}

/// Verify the bearer token and resolve the caller's role.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .map(str::to_owned);

    match authenticate(&state.verifier, state.resolver.as_ref(), token.as_deref()).await {
        Ok(identity) => {
            request.extensions_mut().insert(Caller(identity));
            next.run(request).await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
