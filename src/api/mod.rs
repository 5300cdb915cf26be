//! Status API server
//!
//! A small read-only HTTP surface for monitoring a running downloader:
//!
//! - `GET /health` - liveness and version
//! - `GET /status` - last successful cycle, last cycle report, watermarks

use crate::Result;
use crate::types::StatusSnapshot;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod routes;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Snapshot updated by the scheduler after each cycle
    pub status: Arc<RwLock<StatusSnapshot>>,
}

/// Create the API router
pub fn create_router(status: Arc<RwLock<StatusSnapshot>>) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/status", get(routes::get_status))
        .with_state(AppState { status })
        .layer(TraceLayer::new_for_http())
}

/// Serve the status API on `bind_address` until `cancel` fires
pub async fn start_api_server(
    bind_address: SocketAddr,
    status: Arc<RwLock<StatusSnapshot>>,
    cancel: CancellationToken,
) -> Result<()> {
    let app = create_router(status);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
