//! Node Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check endpoint
//! - `GET /nodes` - Every node, keyed by id
//! - `GET /nodes/:id/tree` - Nested subtree rooted at a node
//! - `POST /nodes` - Create a node under a parent
//! - `PATCH /nodes/:id` - Update a node's properties
//! - `PUT /nodes/:id/parent` - Move a node to another parent or position
//! - `DELETE /nodes/:id` - Delete a node and its subtree
//!
//! Every mutating endpoint answers with the delta of changed and removed
//! nodes, which clients merge into their local copy.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, patch, put},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, HttpError};
use arbor_core::tree::{MaterializedNode, NodeCollection, NodeDelta};
use arbor_core::{NewNode, Node, NodeUpdate};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub node: NewNode,
    pub parent_node_id: String,
    /// Negative or absent appends
    #[serde(default)]
    pub insert_at_index: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeResponse {
    pub node: Node,
    pub delta: NodeDelta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparentRequest {
    pub new_parent_id: String,
    /// Negative or absent appends
    #[serde(default)]
    pub insert_at_index: Option<i64>,
}

/// Map a signed client index to an insert position; negative means append
fn insert_position(index: Option<i64>) -> Option<usize> {
    index.and_then(|index| usize::try_from(index).ok())
}

/// Health check endpoint
///
/// ```bash
/// curl http://localhost:3001/api/health
/// ```
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_nodes(State(state): State<AppState>) -> Result<Json<NodeCollection>, HttpError> {
    Ok(Json(state.service.list_nodes().await?))
}

async fn get_subtree(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MaterializedNode>, HttpError> {
    Ok(Json(state.service.subtree(&id).await?))
}

/// Create a node
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3001/nodes \
///   -H "Content-Type: application/json" \
///   -d '{
///     "node": {"title": "Direct air capture", "setMetrics": {"readinessLevel": 4}},
///     "parentNodeId": "6f1c...",
///     "insertAtIndex": 0
///   }'
/// ```
async fn create_node(
    State(state): State<AppState>,
    Json(request): Json<CreateNodeRequest>,
) -> Result<Json<CreateNodeResponse>, HttpError> {
    let (node, delta) = state
        .service
        .create_node(
            request.node,
            &request.parent_node_id,
            insert_position(request.insert_at_index),
        )
        .await
        .map_err(|e| {
            tracing::warn!("create under {} failed: {}", request.parent_node_id, e);
            HttpError::from(e)
        })?;

    tracing::debug!("created node {}", node.id);
    Ok(Json(CreateNodeResponse { node, delta }))
}

async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<NodeUpdate>,
) -> Result<Json<NodeDelta>, HttpError> {
    tracing::debug!("update request for node {}: {:?}", id, update);
    Ok(Json(state.service.update_node(&id, &update).await?))
}

async fn reparent_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReparentRequest>,
) -> Result<Json<NodeDelta>, HttpError> {
    let delta = state
        .service
        .reparent_node(
            &id,
            &request.new_parent_id,
            insert_position(request.insert_at_index),
        )
        .await
        .map_err(|e| {
            tracing::warn!("move of {} under {} rejected: {}", id, request.new_parent_id, e);
            HttpError::from(e)
        })?;

    Ok(Json(delta))
}

async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeDelta>, HttpError> {
    Ok(Json(state.service.delete_node(&id).await?))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/nodes", get(list_nodes).post(create_node))
        .route("/nodes/:id", patch(update_node).delete(delete_node))
        .route("/nodes/:id/tree", get(get_subtree))
        .route("/nodes/:id/parent", put(reparent_node))
        .with_state(state)
}
