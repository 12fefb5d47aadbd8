//! Sharding and transaction-scope walkthrough against a running node
//!
//! 1. plain store, inside a completed scope        -> "x"
//! 2. sharded store (on Region), no scope          -> "Africa/y"
//! 3. sharded store, inside a completed scope      -> "Africa/z"
//!
//! then loads all three through a plain store. Every shard defaults to the
//! node at `SHARDSTORE_URL` (http://localhost:8092).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use shardstore::{
    DocumentStore, ShardedDocumentStore, StoreConfig, StoreMetrics, StoreRegistry,
    TransactionScope,
};

const COLLECTION: &str = "Customers";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    name: String,
    region: String,
}

fn customer() -> Customer {
    Customer {
        name: "Customer 1".to_string(),
        region: "Africa".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = StoreConfig::load()?;
    shardstore::init_tracing(&config.log_level)?;

    if config.shard_endpoints()?.is_empty() {
        config.shard_list = Some(format!("Africa={}", config.url));
    }

    let metrics = StoreMetrics::detached();
    let database = config.database.clone();

    normal_store_with_scope(&config, &metrics, "x").await?;

    let registry = Arc::new(StoreRegistry::from_config(&config, metrics.clone())?);
    let router = registry.router().sharding_on_field(COLLECTION, "Region");
    let sharded = ShardedDocumentStore::new(Arc::clone(&registry), router)?;

    sharded_store_without_scope(&sharded, &database, "y").await?;
    sharded_store_with_scope(&sharded, &database, "z").await?;

    let store = DocumentStore::from_config(&config, metrics)?;
    let mut session = store.open_session(&database);
    for key in ["x", "Africa/y", "Africa/z"] {
        if session.try_load(key).await?.is_none() {
            bail!("document '{key}' cannot be missing");
        }
        info!(key, "Document present");
    }

    let state = registry.state();
    info!(
        shards = state.shard_count(),
        healthy_shards = state.healthy_shards(),
        documents_written = state.total_documents_written(),
        "Shard state"
    );

    sharded.close().await;
    info!("All documents present");
    Ok(())
}

/// Plain store: the scope defers the write until it completes
async fn normal_store_with_scope(config: &StoreConfig, metrics: &StoreMetrics, id: &str) -> Result<()> {
    let store = DocumentStore::from_config(config, metrics.clone())?;
    let mut scope = TransactionScope::begin().with_metrics(metrics.clone());

    {
        let mut session = store.open_session(&config.database);
        session.store_entity(COLLECTION, id, &customer())?;
        session.save_changes_in(&mut scope).await?;
    }

    scope.complete().await?;
    Ok(())
}

async fn sharded_store_without_scope(store: &ShardedDocumentStore, database: &str, id: &str) -> Result<()> {
    let mut session = store.open_session(database)?;
    let key = session.store_entity(COLLECTION, id, &customer())?;
    session.save_changes().await?;
    info!(key = %key, "Stored through sharded store");
    Ok(())
}

/// Sharded store: the write lands before (and regardless of) completion
async fn sharded_store_with_scope(store: &ShardedDocumentStore, database: &str, id: &str) -> Result<()> {
    let mut scope = TransactionScope::begin();

    {
        let mut session = store.open_session(database)?;
        let key = session.store_entity(COLLECTION, id, &customer())?;
        session.save_changes_in(&mut scope).await?;
        info!(key = %key, scope_id = scope.id(), "Stored through sharded store inside scope");
    }

    scope.complete().await?;
    Ok(())
}
