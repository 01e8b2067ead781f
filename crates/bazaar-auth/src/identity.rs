//! Request identity.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use bazaar_core::{ErrorKind, Role, UserId};

use crate::resolver::{ResolverError, RoleResolver};
use crate::token::{TokenError, TokenVerifier};

/// The authenticated caller for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: UserId,
    /// Resolved from the role store. Used for every authorization decision.
    pub role: Role,
    /// As embedded in the token. Informational only.
    pub claimed_role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("subject {0} is not known to the role store")]
    UnknownSubject(String),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingToken => ErrorKind::Unauthorized,
            Self::Token(_) | Self::UnknownSubject(_) => ErrorKind::Forbidden,
            Self::Resolver(ResolverError::Config(_)) => ErrorKind::Internal,
            Self::Resolver(_) => ErrorKind::BadGateway,
        }
    }

    /// Message safe to return to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingToken => "missing bearer token".to_string(),
            Self::Token(TokenError::Expired) => "token has expired".to_string(),
            Self::Token(_) | Self::UnknownSubject(_) => "invalid credentials".to_string(),
            Self::Resolver(ResolverError::Config(_)) => "internal server error".to_string(),
            Self::Resolver(_) => "role store unavailable".to_string(),
        }
    }
}

/// Extract the token from an `Authorization` header value. Returns `None`
/// for anything other than a non-empty `Bearer` credential.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Verify the token, then resolve the subject's current role.
pub async fn authenticate(
    verifier: &TokenVerifier,
    resolver: &dyn RoleResolver,
    token: Option<&str>,
) -> Result<Identity, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    let claims = verifier.verify(token)?;
    let subject = UserId::new(&claims.sub).map_err(|e| TokenError::Invalid(e.to_string()))?;

    let role = resolver
        .resolve(&subject)
        .await?
        .ok_or_else(|| AuthError::UnknownSubject(claims.sub.clone()))?;

    if role != claims.role {
        tracing::info!(
            subject = %subject,
            claimed = %claims.role,
            resolved = %role,
            "role changed since token issuance"
        );
    }

    Ok(Identity {
        subject,
        role,
        claimed_role: claims.role,
        issued_at: timestamp(claims.iat),
        expires_at: timestamp(claims.exp),
    })
}
