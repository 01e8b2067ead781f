//! # bazaar-gateway: Edge Gateway
//!
//! Decides which backend a request reaches and under what identity.
//!
//! ## Request Path
//!
//! ```text
//! TraceLayer → dispatch (fallback)
//!                ├─ canonical_path           decode, resolve, re-encode, else ValidationError
//!                ├─ RouteTable::match_path   longest prefix, else NotFound
//!                ├─ authenticate             Unauthorized / Forbidden / BadGateway
//!                ├─ policy::decide           Forbidden
//!                └─ forward                  BadGateway on timeout or refusal
//! ```
//!
//! The route table and policies are loaded once at startup and shared
//! read-only. The gateway keeps no session state between requests.
//!
//! ## Gateway-owned Paths
//!
//! | Path                | Purpose                         |
//! |---------------------|---------------------------------|
//! | `/health/liveness`  | process is up                   |
//! | `/health/readiness` | ready to serve                  |
//! | `/metrics`          | Prometheus exposition           |
//!
//! Route prefixes may not shadow these.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod policy;
pub mod routes;
pub mod telemetry;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::config::{ConfigError, GatewayConfig};
pub use crate::dispatch::GatewayState;
pub use crate::error::GatewayError;
pub use crate::policy::{decide, Access, Decision};
pub use crate::routes::{RouteRule, RouteTable, Rewrite};

/// Assemble the gateway router.
pub fn app(state: GatewayState) -> Router {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(telemetry::render))
        .fallback(dispatch::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check. Always 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check. The route table is immutable, so ready once serving.
async fn readiness() -> &'static str {
    "ready"
}
