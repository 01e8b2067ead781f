//! Order service configuration, read once from the environment at startup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use zeroize::Zeroizing;

use bazaar_auth::{ResolverError, RoleStoreConfig, TokenError};
use bazaar_state::{OrderStatus, StatusRegistry, StatusUpdate};

use crate::pricing::PriceList;

const DEFAULT_PORT: u16 = 4004;
const DEFAULT_ROLE_STORE_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("status registry: {0}")]
    Registry(String),

    #[error("price list: {0}")]
    PriceList(String),

    #[error(transparent)]
    RoleStore(#[from] ResolverError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Custom `Debug` redacts the signing secret and the database URL, which
/// usually embeds a password.
#[derive(Clone)]
pub struct OrdersConfig {
    pub port: u16,
    pub jwt_secret: Zeroizing<String>,
    pub jwt_leeway_secs: u64,
    pub role_store: RoleStoreConfig,
    pub database_url: Option<Zeroizing<String>>,
    pub status_registry_file: Option<PathBuf>,
    pub price_list_file: Option<PathBuf>,
}

impl std::fmt::Debug for OrdersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("role_store", &self.role_store)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("status_registry_file", &self.status_registry_file)
            .field("price_list_file", &self.price_list_file)
            .finish()
    }
}

impl OrdersConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ORDERS_PORT` (default: 4004)
    /// - `JWT_SECRET` (required, non-empty)
    /// - `JWT_LEEWAY_SECS` (default: 0)
    /// - `ROLE_STORE_URL` or `ROLE_STORE_FILE` (exactly one)
    /// - `ROLE_STORE_TIMEOUT_SECS` (default: 5)
    /// - `DATABASE_URL` (optional; in-memory only when absent)
    /// - `STATUS_REGISTRY_FILE` (optional YAML overrides)
    /// - `PRICE_LIST_FILE` (optional; submitted unit prices are trusted when absent)
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = non_empty_var("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?;
        let timeout = env_parse("ROLE_STORE_TIMEOUT_SECS", DEFAULT_ROLE_STORE_TIMEOUT_SECS)?;

        Ok(Self {
            port: env_parse("ORDERS_PORT", DEFAULT_PORT)?,
            jwt_secret: Zeroizing::new(jwt_secret),
            jwt_leeway_secs: env_parse("JWT_LEEWAY_SECS", 0)?,
            role_store: RoleStoreConfig::from_env(timeout)?,
            database_url: non_empty_var("DATABASE_URL").map(Zeroizing::new),
            status_registry_file: non_empty_var("STATUS_REGISTRY_FILE").map(PathBuf::from),
            price_list_file: non_empty_var("PRICE_LIST_FILE").map(PathBuf::from),
        })
    }

    /// The price list, if one is configured.
    pub fn load_price_list(&self) -> Result<Option<PriceList>, ConfigError> {
        let Some(path) = &self.price_list_file else {
            return Ok(None);
        };
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        PriceList::from_yaml(&yaml).map(Some)
    }

    /// The status registry: the standard one, with file overrides applied.
    pub fn load_registry(&self) -> Result<StatusRegistry, ConfigError> {
        let Some(path) = &self.status_registry_file else {
            return Ok(StatusRegistry::standard());
        };
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        registry_from_yaml(&yaml)
    }
}

/// Parse a YAML map of `status: {description?, color?, sortOrder?, active?}`
/// and apply it to the standard registry.
pub fn registry_from_yaml(yaml: &str) -> Result<StatusRegistry, ConfigError> {
    let overrides: BTreeMap<OrderStatus, StatusUpdate> =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Registry(e.to_string()))?;
    StatusRegistry::with_overrides(&overrides).map_err(|e| ConfigError::Registry(e.to_string()))
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
