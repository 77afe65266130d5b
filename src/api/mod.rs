//! REST API over the node repository.
//!
//! Routes:
//! - `GET /` service description
//! - `GET /health` liveness probe
//! - `GET /api/wave-nodes` all nodes
//! - `GET /api/wave-nodes/{slug}` one node, 404 when absent
//! - `PATCH /api/wave-nodes/{slug}` set the node's endpoint URL
//! - `GET /api/nodes/active` nodes that are on

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::storage::NodeRepository;

pub use types::{ErrorResponse, HealthResponse, NodeUpdate, RootResponse};

/// State shared across request handlers.
///
/// The repository serializes its own writes, so no extra lock is needed.
pub struct AppState {
    pub repo: Arc<dyn NodeRepository>,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/wave-nodes", get(handlers::list_nodes))
        .route(
            "/api/wave-nodes/{slug}",
            get(handlers::get_node).patch(handlers::update_node),
        )
        .route("/api/nodes/active", get(handlers::list_active))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process ends.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
