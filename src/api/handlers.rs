//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinError;
use tracing::{info, warn};

use super::AppState;
use super::types::{Endpoints, ErrorResponse, HealthResponse, NodeUpdate, RootResponse};
use crate::devices::WaveNode;
use crate::storage::{NodeRepository, StorageError, StorageResult};

/// Failure while serving a request, mapped to an HTTP status.
pub enum ApiError {
    Storage(StorageError),
    /// The blocking repository task panicked or was cancelled.
    Task(JoinError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Storage(StorageError::NodeNotFound(id)) => (
                StatusCode::NOT_FOUND,
                format!("WaveNode with ID '{id}' not found"),
            ),
            Self::Storage(e @ StorageError::UserNotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            Self::Storage(e) => {
                warn!(error = %e, "Storage failure while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Self::Task(e) => {
                warn!(error = %e, "Repository task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs a repository call on the blocking pool.
///
/// The file-backed store reads, fsyncs and renames files, which must not
/// stall the request loop.
async fn with_repo<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn NodeRepository) -> StorageResult<T> + Send + 'static,
{
    let repo = Arc::clone(&state.repo);
    let result = tokio::task::spawn_blocking(move || f(repo.as_ref()))
        .await
        .map_err(ApiError::Task)?;
    Ok(result?)
}

/// `GET /` → service name, version and route templates.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "WavesLab Simulation Environment API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            nodes: "/api/wave-nodes".to_string(),
            specific_node: "/api/wave-nodes/{slug}".to_string(),
            active_nodes: "/api/nodes/active".to_string(),
        },
    })
}

/// `GET /health` → 200 + `{"status": "healthy", ...}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "waveslab-api".to_string(),
    })
}

pub async fn list_nodes(State(state): State<Arc<AppState>>) -> ApiResult<Vec<WaveNode>> {
    let nodes = with_repo(&state, |repo| repo.list_all()).await?;
    info!(count = nodes.len(), "Listed wave nodes");
    Ok(Json(nodes))
}

/// `GET /api/wave-nodes/{slug}` → 200 + node, or 404 + `ErrorResponse`
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<WaveNode> {
    let lookup = slug.clone();
    match with_repo(&state, move |repo| repo.get(&lookup)).await? {
        Some(node) => Ok(Json(node)),
        None => {
            warn!(%slug, "Node not found");
            Err(StorageError::NodeNotFound(slug).into())
        }
    }
}

/// `PATCH /api/wave-nodes/{slug}` with `{"endpoint_url": ...}` → updated node
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(update): Json<NodeUpdate>,
) -> ApiResult<WaveNode> {
    let endpoint = update.endpoint_url.unwrap_or_default();
    let node = {
        let (slug, endpoint) = (slug.clone(), endpoint.clone());
        with_repo(&state, move |repo| repo.update_endpoint(&slug, &endpoint)).await?
    };
    info!(%slug, %endpoint, "Updated node endpoint");
    Ok(Json(node))
}

pub async fn list_active(State(state): State<Arc<AppState>>) -> ApiResult<Vec<WaveNode>> {
    let nodes = with_repo(&state, |repo| repo.list_active()).await?;
    info!(count = nodes.len(), "Listed active nodes");
    Ok(Json(nodes))
}
