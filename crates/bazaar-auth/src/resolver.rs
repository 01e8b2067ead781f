//! # Role Resolution
//!
//! The user/role store is an external collaborator. [`RoleResolver`] is the
//! seam: the gateway and the order service hold an `Arc<dyn RoleResolver>`
//! and never read roles from tokens for authorization.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use bazaar_core::{Role, UserId};

#[derive(Error, Debug)]
pub enum ResolverError {
    /// The store could not be reached or timed out.
    #[error("role store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with something other than a role or a 404.
    #[error("role store returned {status}: {message}")]
    UnexpectedResponse { status: u16, message: String },

    #[error("role store configuration: {0}")]
    Config(String),
}

/// Current role assignment lookup.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// Returns `Ok(None)` when the store does not know the subject.
    async fn resolve(&self, subject: &UserId) -> Result<Option<Role>, ResolverError>;
}

// ── Static ──────────────────────────────────────────────────────────────────

/// In-memory role table, optionally loaded from a YAML `subject: role` map.
/// Assignments can change at runtime.
#[derive(Debug, Default)]
pub struct StaticRoleResolver {
    roles: RwLock<HashMap<UserId, Role>>,
}

impl StaticRoleResolver {
    pub fn new(roles: impl IntoIterator<Item = (UserId, Role)>) -> Self {
        Self {
            roles: RwLock::new(roles.into_iter().collect()),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ResolverError> {
        let raw: HashMap<String, Role> =
            serde_yaml::from_str(yaml).map_err(|e| ResolverError::Config(e.to_string()))?;
        let mut roles = HashMap::with_capacity(raw.len());
        for (subject, role) in raw {
            let subject = UserId::new(&subject).map_err(|e| ResolverError::Config(e.to_string()))?;
            roles.insert(subject, role);
        }
        Ok(Self {
            roles: RwLock::new(roles),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ResolverError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    pub fn assign(&self, subject: UserId, role: Role) {
        self.roles.write().insert(subject, role);
    }

    pub fn revoke(&self, subject: &UserId) {
        self.roles.write().remove(subject);
    }

    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, subject: &UserId) -> Result<Option<Role>, ResolverError> {
        Ok(self.roles.read().get(subject).copied())
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RoleResponse {
    role: Role,
}

/// Queries `GET {base}/users/{id}/role`, expecting `{"role": "<role>"}`.
/// A 404 means the subject is unknown.
#[derive(Debug, Clone)]
pub struct HttpRoleResolver {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRoleResolver {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ResolverError> {
        if base_url.cannot_be_a_base() {
            return Err(ResolverError::Config(format!(
                "role store URL {base_url} cannot be a base"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::Config(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn role_url(&self, subject: &UserId) -> Result<Url, ResolverError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ResolverError::Config("role store URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["users", subject.as_str(), "role"]);
        Ok(url)
    }
}

#[async_trait]
impl RoleResolver for HttpRoleResolver {
    async fn resolve(&self, subject: &UserId) -> Result<Option<Role>, ResolverError> {
        let url = self.role_url(subject)?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ResolverError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ResolverError::UnexpectedResponse {
                status: status.as_u16(),
                message,
            });
        }
        let body: RoleResponse = resp
            .json()
            .await
            .map_err(|e| ResolverError::UnexpectedResponse {
                status: status.as_u16(),
                message: e.to_string(),
            })?;
        Ok(Some(body.role))
    }
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Where roles come from. Exactly one source is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleStoreConfig {
    Http { base_url: Url, timeout_secs: u64 },
    File(std::path::PathBuf),
}

impl RoleStoreConfig {
    /// Read `ROLE_STORE_URL` or `ROLE_STORE_FILE`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, ResolverError> {
        let url = std::env::var("ROLE_STORE_URL").ok().filter(|s| !s.is_empty());
        let file = std::env::var("ROLE_STORE_FILE").ok().filter(|s| !s.is_empty());
        Self::from_sources(url, file, timeout_secs)
    }

    pub fn from_sources(
        url: Option<String>,
        file: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ResolverError> {
        match (url, file) {
            (Some(url), None) => {
                let base_url = Url::parse(&url)
                    .map_err(|e| ResolverError::Config(format!("ROLE_STORE_URL: {e}")))?;
                Ok(Self::Http {
                    base_url,
                    timeout_secs,
                })
            }
            (None, Some(file)) => Ok(Self::File(file.into())),
            (Some(_), Some(_)) => Err(ResolverError::Config(
                "set only one of ROLE_STORE_URL and ROLE_STORE_FILE".into(),
            )),
            (None, None) => Err(ResolverError::Config(
                "one of ROLE_STORE_URL or ROLE_STORE_FILE is required".into(),
            )),
        }
    }

    pub fn build(&self) -> Result<Arc<dyn RoleResolver>, ResolverError> {
        match self {
            Self::Http {
                base_url,
                timeout_secs,
            } => Ok(Arc::new(HttpRoleResolver::new(
                base_url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            Self::File(path) => Ok(Arc::new(StaticRoleResolver::from_file(path)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn static_resolver_tracks_changes() {
        let resolver = StaticRoleResolver::new([(uid("u1"), Role::Admin)]);
        assert_eq!(resolver.resolve(&uid("u1")).await.unwrap(), Some(Role::Admin));

        resolver.assign(uid("u1"), Role::Customer);
        assert_eq!(resolver.resolve(&uid("u1")).await.unwrap(), Some(Role::Customer));

        resolver.revoke(&uid("u1"));
        assert_eq!(resolver.resolve(&uid("u1")).await.unwrap(), None);
    }

    #[test]
    fn static_resolver_from_yaml() {
        let resolver =
            StaticRoleResolver::from_yaml("alice: admin\nbob: sales-staff\ncarol: customer\n")
                .unwrap();
        assert_eq!(resolver.len(), 3);
    }

    #[test]
    fn static_resolver_rejects_unknown_role() {
        let err = StaticRoleResolver::from_yaml("alice: overlord\n").unwrap_err();
        assert!(matches!(err, ResolverError::Config(_)));
    }

    #[test]
    fn static_resolver_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.yaml");
        std::fs::write(&path, "dave: technician\n").unwrap();
        let resolver = StaticRoleResolver::from_file(&path).unwrap();
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn role_url_escapes_subject() {
        let resolver = HttpRoleResolver::new(
            Url::parse("http://roles.internal/api/").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = resolver.role_url(&uid("a/b")).unwrap();
        assert_eq!(url.as_str(), "http://roles.internal/api/users/a%2Fb/role");
    }

    #[test]
    fn exactly_one_source_required() {
        assert!(RoleStoreConfig::from_sources(None, None, 5).is_err());
        assert!(RoleStoreConfig::from_sources(
            Some("http://roles".into()),
            Some("roles.yaml".into()),
            5
        )
        .is_err());
        assert_eq!(
            RoleStoreConfig::from_sources(None, Some("roles.yaml".into()), 5).unwrap(),
            RoleStoreConfig::File("roles.yaml".into())
        );
        assert!(matches!(
            RoleStoreConfig::from_sources(Some("http://roles:9000".into()), None, 5).unwrap(),
            RoleStoreConfig::Http { timeout_secs: 5, .. }
        ));
    }
}
