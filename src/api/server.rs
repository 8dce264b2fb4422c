//! HTTP/WebSocket server setup

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use super::routes::create_router;
use super::shared::{SharedState, SharedStateHandle};

/// Create the shared state handle used across the server, the engine,
/// and the capture pipeline
pub fn create_shared_state() -> SharedStateHandle {
    Arc::new(SharedState::new())
}

/// Run the API server until the shutdown signal flips
pub async fn run_server(
    port: u16,
    state: SharedStateHandle,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("API server shutting down");
        })
        .await?;

    Ok(())
}
