//! # bazaar-orders binary
//!
//! Loads configuration and the status registry, connects to Postgres when
//! configured, hydrates the in-memory store, and serves until interrupted.

use anyhow::Context;
use bazaar_auth::TokenVerifier;
use bazaar_orders::{AppState, OrdersConfig};

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

    let config = OrdersConfig::from_env().context("order service configuration")?;
    let registry = config.load_registry().context("status registry")?;
    let verifier = TokenVerifier::new(config.jwt_secret.as_bytes(), config.jwt_leeway_secs)
        .context("JWT_SECRET")?;
    let resolver = config.role_store.build().context("role store")?;

    let mut state = AppState::new(registry, verifier, resolver);
    if let Some(prices) = config.load_price_list().context("price list")? {
        tracing::info!(products = prices.len(), "price list loaded");
        state = state.with_price_list(prices);
    }
    let pool = bazaar_orders::db::init_pool(config.database_url.as_deref().map(String::as_str))
        .await
        .context("database")?;
    if let Some(pool) = pool {
        state = state.with_db_pool(pool);
        state
            .hydrate_from_db()
            .await
            .context("hydrating from database")?;
    }

    let app = bazaar_orders::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("bazaar order service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
