//! shardstore - sharded document-store client with transactional sessions
//!
//! - [`DocumentStore`] talks to a single backend endpoint
//! - [`ShardedDocumentStore`] routes documents across a [`StoreRegistry`]
//!   by a per-collection shard key (e.g. `Region`)
//! - [`TransactionScope`] defers single-shard writes until completion;
//!   sharded writes are NOT covered by a scope and commit immediately
//! - [`server`] is the HTTP document node the backends talk to

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shard;
pub mod transaction;

pub use backend::{DocumentBackend, HttpBackend, InMemoryBackend, RetryPolicy};
pub use config::StoreConfig;
pub use document::{Change, Document};
pub use error::{RoutingError, StoreError};
pub use metrics::StoreMetrics;
pub use session::{DocumentStore, Session, ShardedDocumentStore};
pub use shard::{ShardRouter, StoreRegistry};
pub use transaction::{TransactionScope, TransactionState};

/// Install the JSON tracing subscriber used by the binaries
pub fn init_tracing(crate_level: &str) -> Result<(), StoreError> {
    use tracing_subscriber::filter::Directive;

    let directive = |d: String| -> Result<Directive, StoreError> {
        d.parse::<Directive>()
            .map_err(|e| StoreError::Config(format!("invalid log directive '{d}': {e}")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive(format!("shardstore={crate_level}"))?)
                .add_directive(directive(format!("sharding_demo={crate_level}"))?)
                .add_directive(directive("hyper=warn".to_string())?)
                .add_directive(directive("reqwest=warn".to_string())?),
        )
        .json()
        .init();
    Ok(())
}
