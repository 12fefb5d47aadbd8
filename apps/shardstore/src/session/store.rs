//! Document stores: session factories

use super::unit_of_work::{Session, Target};
use crate::backend::{DocumentBackend, HttpBackend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::StoreMetrics;
use crate::shard::{ShardRouter, StoreRegistry};

use std::sync::Arc;
use tracing::info;

/// Store backed by a single endpoint
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    metrics: StoreMetrics,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            metrics: StoreMetrics::default(),
        }
    }

    /// HTTP store at `config.url`
    pub fn from_config(config: &StoreConfig, metrics: StoreMetrics) -> Result<Self, StoreError> {
        let backend = HttpBackend::new(
            config.url.clone(),
            config.request_timeout(),
            config.retry_policy(),
            metrics.clone(),
        )?;
        info!(url = %config.url, "Document store initialized");
        Ok(Self::new(Arc::new(backend)).with_metrics(metrics))
    }

    pub fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    pub fn open_session(&self, database: &str) -> Session {
        Session::new(
            database,
            Target::Single {
                backend: Arc::clone(&self.backend),
            },
            self.metrics.clone(),
        )
    }
}

/// Store that routes documents across the shards of a registry
pub struct ShardedDocumentStore {
    registry: Arc<StoreRegistry>,
    router: Arc<ShardRouter>,
}

impl ShardedDocumentStore {
    /// Every shard the router can route to must exist in the registry
    pub fn new(registry: Arc<StoreRegistry>, router: ShardRouter) -> Result<Self, StoreError> {
        if let Some(missing) = router.shards().find(|name| registry.shard(name).is_none()) {
            return Err(StoreError::Config(format!(
                "router shard '{missing}' is not registered"
            )));
        }

        info!(
            shards = ?registry.shard_names().collect::<Vec<_>>(),
            "Sharded document store initialized"
        );

        Ok(Self {
            registry,
            router: Arc::new(router),
        })
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn open_session(&self, database: &str) -> Result<Session, StoreError> {
        self.registry.ensure_open()?;
        Ok(Session::new(
            database,
            Target::Sharded {
                registry: Arc::clone(&self.registry),
                router: Arc::clone(&self.router),
            },
            self.registry.metrics().clone(),
        ))
    }

    /// Close the underlying registry
    pub async fn close(&self) {
        self.registry.close().await;
    }
}
