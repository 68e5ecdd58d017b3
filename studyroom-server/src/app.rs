use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::relay::RelayHandle;
use crate::room::RegistrySnapshot;
use crate::signaling::ws_handler;

/// HTTP surface of the relay: the participant socket and a health probe.
pub fn router(relay: RelayHandle) -> Router {
    // Browser clients are served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(relay)
}

async fn health(State(relay): State<RelayHandle>) -> Result<Json<RegistrySnapshot>, StatusCode> {
    relay.snapshot().await.map(Json).map_err(|e| {
        error!("Health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })
}

/// Runs the relay on an already bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let directory = config.directory()?;
    let relay = RelayHandle::spawn(&config, directory);

    info!("Relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Binds `config.bind` and runs the relay until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<(), RelayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind).await?;
    serve_with_shutdown(listener, config, shutdown).await
}
