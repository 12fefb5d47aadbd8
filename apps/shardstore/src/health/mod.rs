//! Health check endpoints

use crate::server::NodeState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub node: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub node: String,
    pub databases: usize,
    pub documents: usize,
}

/// Health routes; state is supplied by the node router
pub fn routes() -> Router<NodeState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler(State(state): State<NodeState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        node: state.node_name.clone(),
    })
}

/// Readiness endpoint - in-memory storage is ready as soon as it exists
async fn ready_handler(State(state): State<NodeState>) -> impl IntoResponse {
    let response = ReadyResponse {
        ready: true,
        node: state.node_name.clone(),
        databases: state.storage.databases().len(),
        documents: state.storage.len(),
    };

    (StatusCode::OK, Json(response))
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<NodeState>) -> impl IntoResponse {
    state.metrics.set_node_documents(state.storage.len());

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}
