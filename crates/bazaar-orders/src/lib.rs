//! # bazaar-orders: Order Service
//!
//! The order service boundary behind the gateway's `/orders` prefix. Owns
//! order records, their status history, and the status registry.
//!
//! ## Request Path
//!
//! ```text
//! TraceLayer → auth_middleware (verify token, resolve role) → handler
//!                                                              └─ service → OrderStore (+ Postgres)
//! ```
//!
//! Reads go to the in-memory store. Writes compare-and-set on the order
//! version; the loser of a race gets `409 CONFLICT` and may retry.
//!
//! ## Unauthenticated Paths
//!
//! | Path                | Purpose          |
//! |---------------------|------------------|
//! | `/health/liveness`  | process is up    |
//! | `/health/readiness` | ready to serve   |

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pricing;
pub mod query;
pub mod routes;
pub mod service;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::config::{ConfigError, OrdersConfig};
pub use crate::error::AppError;
pub use crate::pricing::PriceList;
pub use crate::state::{AppState, OrderStore, StoreError};

/// Assemble the order service router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::orders::router())
        .merge(routes::statuses::router())
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .merge(api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "ok"
}

/// Ready once hydration has finished, which happens before the port binds.
async fn readiness() -> &'static str {
    "ready"
}

async fn not_found() -> AppError {
    AppError::NotFound("no such endpoint".into())
}
