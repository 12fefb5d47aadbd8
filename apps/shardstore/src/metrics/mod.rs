//! Prometheus metrics module
//!
//! Library code records through the `metrics` facade unconditionally; the
//! calls are no-ops until a binary installs the Prometheus recorder with
//! [`StoreMetrics::install`].

use crate::error::StoreError;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// `shard` label for writes and loads of a single-shard store
pub const UNSHARDED_LABEL: &str = "unsharded";

/// Metrics collector shared by stores, sessions and the document node
///
/// Recording always goes through the `metrics` facade, so every instance
/// reports to the same recorder. The handle only decides what
/// [`render`](Self::render) returns.
#[derive(Clone, Default)]
pub struct StoreMetrics {
    handle: Option<Arc<PrometheusHandle>>,
}

impl StoreMetrics {
    /// Same as `Default`: records through the facade, renders nothing
    pub fn detached() -> Self {
        Self { handle: None }
    }

    /// Install the Prometheus recorder and return a renderable handle
    pub fn install() -> Result<Self, StoreError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| StoreError::Config(format!("failed to install Prometheus recorder: {e}")))?;

        Self::register_metrics();

        Ok(Self {
            handle: Some(Arc::new(handle)),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "shardstore_documents_written_total",
            Unit::Count,
            "Documents written to a shard"
        );
        describe_counter!(
            "shardstore_documents_loaded_total",
            Unit::Count,
            "Documents loaded from a shard"
        );
        describe_counter!(
            "shardstore_load_misses_total",
            Unit::Count,
            "Loads that found no document"
        );
        describe_counter!(
            "shardstore_routing_failures_total",
            Unit::Count,
            "Documents that could not be routed to a shard"
        );
        describe_counter!("shardstore_errors_total", Unit::Count, "Total store errors");
        describe_counter!(
            "shardstore_transactions_total",
            Unit::Count,
            "Transaction scopes by outcome"
        );

        describe_histogram!(
            "shardstore_backend_request_duration_seconds",
            Unit::Seconds,
            "Latency of backend requests"
        );

        describe_gauge!(
            "shardstore_node_documents",
            Unit::Count,
            "Documents held by this node"
        );
    }

    /// `shard` is the shard name, or [`UNSHARDED_LABEL`] for a plain store
    pub fn record_written(&self, shard: &str, count: usize) {
        counter!(
            "shardstore_documents_written_total",
            "shard" => shard.to_string()
        )
        .increment(count as u64);
    }

    pub fn record_loaded(&self, shard: &str) {
        counter!(
            "shardstore_documents_loaded_total",
            "shard" => shard.to_string()
        )
        .increment(1);
    }

    pub fn record_load_miss(&self, shard: &str) {
        counter!(
            "shardstore_load_misses_total",
            "shard" => shard.to_string()
        )
        .increment(1);
    }

    pub fn record_routing_failure(&self, collection: &str) {
        counter!(
            "shardstore_routing_failures_total",
            "collection" => collection.to_string()
        )
        .increment(1);
    }

    pub fn record_error(&self, error: &StoreError) {
        counter!(
            "shardstore_errors_total",
            "error_type" => error.error_type_label()
        )
        .increment(1);
    }

    /// Outcome is one of `committed`, `rolled_back`
    pub fn record_transaction(&self, outcome: &'static str) {
        counter!("shardstore_transactions_total", "outcome" => outcome).increment(1);
    }

    pub fn record_request(&self, endpoint: &str, operation: &'static str, duration: Duration) {
        histogram!(
            "shardstore_backend_request_duration_seconds",
            "endpoint" => endpoint.to_string(),
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    pub fn set_node_documents(&self, count: usize) {
        gauge!("shardstore_node_documents").set(count as f64);
    }

    /// Render metrics in Prometheus format (empty when detached)
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(|handle| handle.render())
            .unwrap_or_default()
    }
}
