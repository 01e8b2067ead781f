//! # Identifier Newtypes
//!
//! Subject and product identifiers are opaque strings minted by other
//! services (the auth service and the catalog). Order identifiers are owned
//! by the order service and are UUIDs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Longest identifier accepted from another service.
const MAX_EXTERNAL_ID_LEN: usize = 128;

/// Identifier of an authenticated subject (customer or staff member).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

fn validate_external(kind: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier(kind));
    }
    if trimmed.len() > MAX_EXTERNAL_ID_LEN {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            max: MAX_EXTERNAL_ID_LEN,
        });
    }
    Ok(trimmed.to_string())
}

impl UserId {
    /// Create a validated subject identifier (non-empty, at most 128 bytes).
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        validate_external("user id", raw.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ProductId {
    /// Create a validated product identifier (non-empty, at most 128 bytes).
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        validate_external("product id", raw.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OrderId {
    /// Generate a new random order identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (e.g. one read back from storage).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse an order identifier from its hyphenated string form.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidOrderId(raw.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
