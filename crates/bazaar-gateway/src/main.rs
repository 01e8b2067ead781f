//! # bazaar-gateway binary
//!
//! Loads configuration and the route table, installs the Prometheus
//! recorder, and serves until interrupted. Any configuration problem exits
//! before the port is bound.

use std::time::Duration;

use anyhow::Context;
use bazaar_auth::TokenVerifier;
use bazaar_gateway::{GatewayConfig, GatewayState};
use metrics_exporter_prometheus::PrometheusBuilder;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::from_env().context("gateway configuration")?;
    let routes = config.load_routes().context("route table")?;
    for rule in routes.rules() {
        tracing::info!(
            prefix = %rule.prefix,
            service = %rule.service,
            target = %rule.target,
            access = %rule.access,
            policies = rule.policies().len(),
            "route loaded"
        );
    }

    let verifier = TokenVerifier::new(config.jwt_secret.as_bytes(), config.jwt_leeway_secs)
        .context("JWT_SECRET")?;
    let resolver = config.role_store.build().context("role store")?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let state = GatewayState::new(
        routes,
        verifier,
        resolver,
        Duration::from_secs(config.upstream_timeout_secs),
        config.max_body_bytes,
    )?
    .with_prometheus(prometheus);

    let app = bazaar_gateway::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("bazaar gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
