//! Domain error types for shardstore
//!
//! Every fallible library operation returns `Result<T, StoreError>`.
//! Binaries (main.rs, the demo) are the only places allowed to use
//! anyhow::Result (process boundary).

use thiserror::Error;

/// Failures while mapping a document or key to a shard
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No sharding function registered for the document's collection
    #[error("no sharding strategy for collection '{collection}'")]
    NoStrategy { collection: String },

    /// The sharding function produced no value for this document
    #[error("document '{key}' in '{collection}' has no shard key")]
    MissingShardKey { key: String, collection: String },

    /// The shard key names a shard that is not configured
    #[error("document '{key}' routes to unknown shard '{shard}'")]
    UnmappedShard { key: String, shard: String },

    /// Key carries no configured shard prefix where one is required
    #[error("key '{key}' does not name a shard")]
    UnqualifiedKey { key: String },
}

/// shardstore domain errors
///
/// Variants carry structured context so callers can match on the failure
/// mode without parsing message strings.
///
/// ```text
/// StoreError::NotFound { key: "Africa/z" }
/// → "document 'Africa/z' not found"
/// ```
#[derive(Error, Debug)]
pub enum StoreError {
    /// Shard key could not be resolved
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Load returned no document
    #[error("document '{key}' not found")]
    NotFound { key: String },

    /// Two shards registered under the same name
    #[error("shard '{name}' is already registered")]
    DuplicateShard { name: String },

    /// Transport failure talking to a backend
    #[error("request to {endpoint} failed")]
    Backend {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with an unexpected status
    #[error("{endpoint} responded with status {status}: {body}")]
    BackendStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Document (de)serialization failed
    #[error("serialization failed for '{key}'")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Entity did not serialize to a JSON object
    #[error("invalid document '{key}': {reason}")]
    InvalidDocument { key: String, reason: String },

    /// Transaction scope used in a state that does not allow the operation
    #[error("transaction {scope_id} cannot move from {from} to {to}")]
    InvalidTransition {
        scope_id: String,
        from: &'static str,
        to: &'static str,
    },

    /// Transaction scope completed after its timeout elapsed
    #[error("transaction {scope_id} timed out after {elapsed_ms}ms (limit {timeout_ms}ms)")]
    TransactionTimeout {
        scope_id: String,
        elapsed_ms: u64,
        timeout_ms: u64,
    },

    /// Registry was closed; no further work is accepted
    #[error("store registry is closed")]
    StoreClosed,

    /// Configuration error (missing or invalid setting)
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Static label for the `error_type` label of `shardstore_errors_total`.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Routing(_) => "routing",
            Self::NotFound { .. } => "not_found",
            Self::DuplicateShard { .. } => "duplicate_shard",
            Self::Backend { .. } => "backend",
            Self::BackendStatus { .. } => "backend_status",
            Self::Serialization { .. } => "serialization",
            Self::InvalidDocument { .. } => "invalid_document",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::TransactionTimeout { .. } => "transaction_timeout",
            Self::StoreClosed => "store_closed",
            Self::Config(_) => "config",
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { source, .. } => source.is_connect() || source.is_timeout(),
            Self::BackendStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_distinct_error_type_label() {
        let labels = [
            StoreError::Routing(RoutingError::NoStrategy {
                collection: "Customers".to_string(),
            })
            .error_type_label(),
            StoreError::NotFound { key: "x".to_string() }.error_type_label(),
            StoreError::DuplicateShard { name: "Africa".to_string() }.error_type_label(),
            StoreError::BackendStatus {
                endpoint: "http://localhost:8092".to_string(),
                status: 500,
                body: String::new(),
            }
            .error_type_label(),
            StoreError::Serialization {
                key: "x".to_string(),
                source: serde_json::from_str::<()>("invalid").unwrap_err(),
            }
            .error_type_label(),
            StoreError::InvalidDocument {
                key: "x".to_string(),
                reason: "not an object".to_string(),
            }
            .error_type_label(),
            StoreError::InvalidTransition {
                scope_id: "t".to_string(),
                from: "Committed",
                to: "Committed",
            }
            .error_type_label(),
            StoreError::TransactionTimeout {
                scope_id: "t".to_string(),
                elapsed_ms: 2,
                timeout_ms: 1,
            }
            .error_type_label(),
            StoreError::StoreClosed.error_type_label(),
            StoreError::Config("test".to_string()).error_type_label(),
        ];

        let mut unique = labels.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "Duplicate error_type_label found");
    }

    #[test]
    fn routing_messages_contain_context() {
        let err = StoreError::from(RoutingError::UnmappedShard {
            key: "y".to_string(),
            shard: "Antarctica".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("'y'"));
        assert!(msg.contains("Antarctica"));

        let err = RoutingError::MissingShardKey {
            key: "y".to_string(),
            collection: "Customers".to_string(),
        };
        assert!(err.to_string().contains("Customers"));
    }

    #[test]
    fn only_server_errors_are_transient() {
        let server = StoreError::BackendStatus {
            endpoint: "e".to_string(),
            status: 503,
            body: String::new(),
        };
        let client = StoreError::BackendStatus {
            endpoint: "e".to_string(),
            status: 400,
            body: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!StoreError::NotFound { key: "x".to_string() }.is_transient());
    }

    #[test]
    fn config_error_preserves_message() {
        let err = StoreError::Config("database must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: database must not be empty"
        );
    }
}
