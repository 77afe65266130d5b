//! API request and response bodies.

use serde::{Deserialize, Serialize};

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    /// Route name to path template.
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Endpoints {
    pub nodes: String,
    pub specific_node: String,
    pub active_nodes: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Body of `PATCH /api/wave-nodes/{slug}`.
///
/// A missing or null `endpoint_url` clears the endpoint, which stops
/// dispatch for the node.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Error body returned with 4xx and 5xx statuses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
