//! HS256 bearer tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use bazaar_core::{Role, UserId};

/// Signed claims. `role` is the role at issuance time; it is an identity
/// hint, not an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies (and, for tooling, issues) tokens signed with a shared secret.
///
/// Custom `Debug` implementation redacts the secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Zeroizing<Vec<u8>>,
    leeway_secs: u64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl TokenVerifier {
    /// A missing or empty secret is a fatal configuration error.
    pub fn new(secret: impl AsRef<[u8]>, leeway_secs: u64) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            leeway_secs,
        })
    }

    /// Check signature and expiry and return the claims.
    ///
    /// Expired, malformed and wrongly signed tokens are all rejected; the
    /// variant only differs for logging.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        UserId::new(&data.claims.sub).map_err(|e| TokenError::Invalid(e.to_string()))?;
        Ok(data.claims)
    }

    /// Sign a token for `subject` valid from `now` for `ttl_secs`.
    pub fn issue(
        &self,
        subject: &UserId,
        role: Role,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.as_str().to_string(),
            role,
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("test-secret-value", 0).unwrap()
    }

    fn subject() -> UserId {
        UserId::new("user-42").unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let v = verifier();
        let token = v.issue(&subject(), Role::SalesStaff, 3600, Utc::now()).unwrap();
        let claims = v.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.role, Role::SalesStaff);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn empty_secret_rejected() {
        assert_eq!(TokenVerifier::new("", 0).unwrap_err(), TokenError::EmptySecret);
    }

    #[test]
    fn expired_token_rejected() {
        let v = verifier();
        let issued = Utc::now() - chrono::Duration::hours(2);
        let token = v.issue(&subject(), Role::Customer, 60, issued).unwrap();
        assert_eq!(v.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn leeway_accepts_recently_expired_token() {
        let v = TokenVerifier::new("test-secret-value", 300).unwrap();
        let issued = Utc::now() - chrono::Duration::seconds(120);
        let token = v.issue(&subject(), Role::Customer, 60, issued).unwrap();
        assert!(v.verify(&token).is_ok());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = TokenVerifier::new("another-secret", 0)
            .unwrap()
            .issue(&subject(), Role::Admin, 3600, Utc::now())
            .unwrap();
        assert!(matches!(verifier().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            verifier().verify("not.a.token"),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(verifier().verify(""), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test-secret-value"));
    }
}
