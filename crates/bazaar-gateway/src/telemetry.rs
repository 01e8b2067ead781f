//! # Prometheus Metrics
//!
//! Recorded through the `metrics` facade. Without an installed recorder the
//! calls are no-ops, which is what the tests rely on. The binary installs
//! the Prometheus recorder and `GET /metrics` renders it.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::dispatch::GatewayState;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "gateway_upstream_failures_total";
pub const UPSTREAM_LATENCY_SECONDS: &str = "gateway_upstream_latency_seconds";

pub fn record_request(service: &str, outcome: &'static str) {
    metrics::counter!(REQUESTS_TOTAL, "service" => service.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_upstream_failure(service: &str) {
    metrics::counter!(UPSTREAM_FAILURES_TOTAL, "service" => service.to_string()).increment(1);
}

pub fn record_upstream_latency(service: &str, elapsed: Duration) {
    metrics::histogram!(UPSTREAM_LATENCY_SECONDS, "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

/// Prometheus text exposition.
pub async fn render(State(state): State<GatewayState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
