//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set the
//! service writes every accepted order mutation and registry edit through to
//! Postgres and hydrates from it on startup. When absent the service runs
//! in-memory only.
//!
//! Transition rules are enforced in the application layer. The database
//! only guards the version column so two replicas cannot overwrite each
//! other.

pub mod orders;
pub mod statuses;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect and run migrations. Returns `None` when no URL is configured.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set; running in-memory only, orders will not survive restarts");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// Wrap a serialization failure so it surfaces as a database error.
pub(crate) fn encode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Encode(Box::new(e))
}

/// Wrap a failure to interpret a stored row.
pub(crate) fn decode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}
