//! Store registry
//!
//! Process-wide mapping of shard names to backends. Built once at startup,
//! shared by reference, torn down with [`StoreRegistry::close`].

use crate::backend::{DocumentBackend, HttpBackend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::StoreMetrics;
use crate::shard::router::ShardRouter;
use crate::shard::state::ShardState;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub struct StoreRegistry {
    shards: BTreeMap<String, Arc<dyn DocumentBackend>>,
    state: ShardState,
    metrics: StoreMetrics,
    closed: AtomicBool,
}

#[derive(Default)]
pub struct StoreRegistryBuilder {
    shards: BTreeMap<String, Arc<dyn DocumentBackend>>,
    metrics: Option<StoreMetrics>,
}

impl StoreRegistryBuilder {
    /// Register a shard; names must be unique
    pub fn shard(
        mut self,
        name: impl Into<String>,
        backend: Arc<dyn DocumentBackend>,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::Config("shard name must not be empty".to_string()));
        }
        if self.shards.contains_key(&name) {
            return Err(StoreError::DuplicateShard { name });
        }
        self.shards.insert(name, backend);
        Ok(self)
    }

    pub fn metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<StoreRegistry, StoreError> {
        if self.shards.is_empty() {
            return Err(StoreError::Config(
                "store registry needs at least one shard".to_string(),
            ));
        }

        let state = ShardState::new(self.shards.keys().cloned());

        info!(
            shard_count = self.shards.len(),
            shards = ?self.shards.keys().collect::<Vec<_>>(),
            "Store registry created"
        );

        Ok(StoreRegistry {
            shards: self.shards,
            state,
            metrics: self.metrics.unwrap_or_default(),
            closed: AtomicBool::new(false),
        })
    }
}

impl StoreRegistry {
    pub fn builder() -> StoreRegistryBuilder {
        StoreRegistryBuilder::default()
    }

    /// One HTTP backend per configured shard
    pub fn from_config(config: &StoreConfig, metrics: StoreMetrics) -> Result<Self, StoreError> {
        let mut builder = Self::builder().metrics(metrics.clone());

        for endpoint in config.shard_endpoints()? {
            let backend = HttpBackend::new(
                endpoint.url.clone(),
                config.request_timeout(),
                config.retry_policy(),
                metrics.clone(),
            )?;
            builder = builder.shard(endpoint.name, Arc::new(backend))?;
        }

        builder.build()
    }

    pub fn shard(&self, name: &str) -> Option<Arc<dyn DocumentBackend>> {
        self.shards.get(name).cloned()
    }

    /// Shard names in stable (sorted) order
    pub fn shard_names(&self) -> impl Iterator<Item = &str> {
        self.shards.keys().map(String::as_str)
    }

    /// Shards in stable (sorted) order
    pub fn shards(&self) -> impl Iterator<Item = (&str, &Arc<dyn DocumentBackend>)> {
        self.shards.iter().map(|(name, backend)| (name.as_str(), backend))
    }

    /// Router over this registry's shards, without any sharding strategy yet
    pub fn router(&self) -> ShardRouter {
        ShardRouter::new(self.shard_names())
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn state(&self) -> &ShardState {
        &self.state
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fails with `StoreClosed` once the registry has been closed
    pub fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Close every backend; subsequent sessions fail with `StoreClosed`
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(shard_count = self.shards.len(), "Closing store registry");
        for backend in self.shards.values() {
            backend.close().await;
        }
    }
}
