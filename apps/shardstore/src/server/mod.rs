//! Document node HTTP API
//!
//! The endpoint a shard (or the plain store) points at:
//! - `GET    /databases/{db}/docs?id=...`  fetch one document
//! - `DELETE /databases/{db}/docs?id=...`  delete one document
//! - `POST   /databases/{db}/bulk_docs`    apply a batch of changes
//!
//! plus the health routes from `crate::health`.

use crate::backend::InMemoryBackend;
use crate::document::Change;
use crate::health;
use crate::metrics::StoreMetrics;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state of the document node
#[derive(Clone)]
pub struct NodeState {
    pub node_name: String,
    pub storage: Arc<InMemoryBackend>,
    pub metrics: StoreMetrics,
}

impl NodeState {
    pub fn new(node_name: impl Into<String>, metrics: StoreMetrics) -> Self {
        let node_name = node_name.into();
        Self {
            storage: Arc::new(InMemoryBackend::new(format!("node://{node_name}"))),
            node_name,
            metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DocQuery {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResponse {
    pub applied: usize,
}

/// Full node router: document API and health endpoints
pub fn router(state: NodeState) -> Router {
    Router::new()
        .route("/databases/{db}/docs", get(get_doc).delete(delete_doc))
        .route("/databases/{db}/bulk_docs", post(bulk_docs))
        .merge(health::routes())
        .with_state(state)
}

fn not_found(key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("document '{key}' not found"),
        }),
    )
        .into_response()
}

async fn get_doc(
    State(state): State<NodeState>,
    Path(db): Path<String>,
    Query(query): Query<DocQuery>,
) -> Response {
    match state.storage.get_document(&db, &query.id) {
        Some(document) => {
            state.metrics.record_loaded(&state.node_name);
            Json(document).into_response()
        }
        None => {
            state.metrics.record_load_miss(&state.node_name);
            debug!(database = %db, key = %query.id, "Document not found");
            not_found(&query.id)
        }
    }
}

async fn delete_doc(
    State(state): State<NodeState>,
    Path(db): Path<String>,
    Query(query): Query<DocQuery>,
) -> Response {
    if state.storage.remove(&db, &query.id) {
        state.metrics.set_node_documents(state.storage.len());
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&query.id)
    }
}

/// Malformed JSON is rejected by the `Json` extractor with a 4xx
async fn bulk_docs(
    State(state): State<NodeState>,
    Path(db): Path<String>,
    Json(changes): Json<Vec<Change>>,
) -> impl IntoResponse {
    let applied = state.storage.apply_changes(&db, &changes);
    let puts = changes.iter().filter(|c| c.is_put()).count();

    state.metrics.record_written(&state.node_name, puts);
    state.metrics.set_node_documents(state.storage.len());
    info!(database = %db, applied, puts, "Batch applied");

    (StatusCode::OK, Json(BulkResponse { applied }))
}
