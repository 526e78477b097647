//! Hostel administration backend — entry point.
//!
//! Boots the SQLite pool (running migrations), spawns the background
//! overdue-fee sweeper, and serves the REST API consumed by the SPA
//! frontend. Authentication tokens are issued and verified upstream;
//! this service decodes their claims into a per-request principal.

mod allocation;
mod api;
mod auth;
mod config;
mod errors;
mod models;
mod notify;
mod store;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = store::init_pool(&config.database_url).await?;

    // HTTP client for outbound reminder dispatch.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    // ─── Background overdue sweeper ───────────────────────
    let cancel = CancellationToken::new();
    tokio::spawn(sweeper::run(
        pool.clone(),
        config.sweep_interval_secs,
        cancel.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let cors = match &config.allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid ALLOWED_ORIGIN"))?,
            ),
        None => CorsLayer::permissive(),
    };

    let addr = format!("0.0.0.0:{}", config.api_port);
    let state = Arc::new(api::AppState {
        pool,
        config,
        http,
    });

    let app = api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, stopping the sweeper on the way out.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    cancel.cancel();
}
