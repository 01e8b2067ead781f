//! Gateway configuration.
//!
//! Read once from the environment at startup. Every problem here is fatal:
//! the binary logs the [`ConfigError`] and exits before binding a port.

use std::path::PathBuf;

use thiserror::Error;
use zeroize::Zeroizing;

use bazaar_auth::{ResolverError, RoleStoreConfig, TokenError};

use crate::routes::RouteTable;

/// Route table compiled into the binary, used when `GATEWAY_ROUTES_FILE` is
/// not set.
pub const DEFAULT_ROUTES: &str = include_str!("../config/routes.yaml");

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("route table: {0}")]
    Parse(String),

    #[error("route {prefix}: {reason}")]
    InvalidRoute { prefix: String, reason: String },

    #[error(transparent)]
    RoleStore(#[from] ResolverError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Custom `Debug` implementation redacts the signing secret.
#[derive(Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub jwt_secret: Zeroizing<String>,
    pub jwt_leeway_secs: u64,
    pub routes_file: Option<PathBuf>,
    pub upstream_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub role_store: RoleStoreConfig,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("routes_file", &self.routes_file)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("role_store", &self.role_store)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `GATEWAY_PORT` (default: 8080)
    /// - `JWT_SECRET` (required, non-empty)
    /// - `JWT_LEEWAY_SECS` (default: 0)
    /// - `GATEWAY_ROUTES_FILE` (default: the bundled table)
    /// - `UPSTREAM_TIMEOUT_SECS` (default: 15)
    /// - `MAX_BODY_BYTES` (default: 10 MiB)
    /// - `ROLE_STORE_URL` or `ROLE_STORE_FILE` (exactly one)
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingVar("JWT_SECRET"))?;
        let upstream_timeout_secs = env_parse("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?;
        if upstream_timeout_secs == 0 {
            return Err(ConfigError::InvalidVar {
                var: "UPSTREAM_TIMEOUT_SECS",
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            port: env_parse("GATEWAY_PORT", DEFAULT_PORT)?,
            jwt_secret: Zeroizing::new(jwt_secret),
            jwt_leeway_secs: env_parse("JWT_LEEWAY_SECS", 0)?,
            routes_file: std::env::var("GATEWAY_ROUTES_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            upstream_timeout_secs,
            max_body_bytes: env_parse("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            role_store: RoleStoreConfig::from_env(upstream_timeout_secs)?,
        })
    }

    /// Load the route table, applying `<SERVICE>_SERVICE_URL` overrides from
    /// the environment.
    pub fn load_routes(&self) -> Result<RouteTable, ConfigError> {
        let yaml = match &self.routes_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_ROUTES.to_string(),
        };
        RouteTable::from_yaml_with(&yaml, |var| std::env::var(var).ok())
    }
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}
