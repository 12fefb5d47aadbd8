//! Document backends
//!
//! A backend is one physical document store endpoint. Shards and the plain
//! (single-shard) store both talk to backends through [`DocumentBackend`].

#[cfg(test)]
pub(crate) mod failing;
mod http;
mod memory;
mod retry;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use retry::RetryPolicy;

use crate::document::{Change, Document};
use crate::error::StoreError;
use async_trait::async_trait;

/// Storage operations a shard endpoint must provide
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Endpoint description used in logs and errors
    fn endpoint(&self) -> &str;

    /// Fetch a document; `Ok(None)` when the key does not exist
    async fn get(&self, database: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Apply a batch of changes in order
    async fn apply(&self, database: &str, changes: &[Change]) -> Result<(), StoreError>;

    /// Release connections. Default is a no-op.
    async fn close(&self) {}
}
