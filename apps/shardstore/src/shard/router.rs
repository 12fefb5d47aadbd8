//! Shard routing
//!
//! Documents are routed by a per-collection extraction function
//! (`Document -> shard name`). A routed document is stored under the
//! qualified key `"<ShardName>/<LocalId>"`, which is how loads find their
//! shard again.

use crate::document::Document;
use crate::error::RoutingError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Separator between shard name and local id in a qualified key
pub const KEY_SEPARATOR: char = '/';

/// Extracts the shard key from a document
pub type ShardKeyFn = Arc<dyn Fn(&Document) -> Option<String> + Send + Sync>;

/// Where a key lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRoute {
    /// Key carries a configured shard prefix
    Shard { shard: String, local_id: String },
    /// No configured shard prefix; any shard may hold it
    Unqualified,
}

#[derive(Clone)]
pub struct ShardRouter {
    shards: BTreeSet<String>,
    strategies: HashMap<String, ShardKeyFn>,
}

impl fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardRouter")
            .field("shards", &self.shards)
            .field("collections", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ShardRouter {
    pub fn new<I, S>(shards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shards: shards.into_iter().map(Into::into).collect(),
            strategies: HashMap::new(),
        }
    }

    /// Route documents of `collection` with `shard_key`
    pub fn sharding_on<F>(mut self, collection: impl Into<String>, shard_key: F) -> Self
    where
        F: Fn(&Document) -> Option<String> + Send + Sync + 'static,
    {
        self.strategies.insert(collection.into(), Arc::new(shard_key));
        self
    }

    /// Route documents of `collection` by the string value of `field`
    pub fn sharding_on_field(self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        self.sharding_on(collection, move |doc: &Document| {
            doc.field_str(&field).map(str::to_string)
        })
    }

    pub fn shards(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().map(String::as_str)
    }

    pub fn has_shard(&self, name: &str) -> bool {
        self.shards.contains(name)
    }

    /// Shard name for a document
    pub fn route(&self, document: &Document) -> Result<String, RoutingError> {
        let strategy = self
            .strategies
            .get(&document.collection)
            .ok_or_else(|| RoutingError::NoStrategy {
                collection: document.collection.clone(),
            })?;

        let shard = strategy(document).ok_or_else(|| RoutingError::MissingShardKey {
            key: document.key.clone(),
            collection: document.collection.clone(),
        })?;

        if !self.shards.contains(&shard) {
            return Err(RoutingError::UnmappedShard {
                key: document.key.clone(),
                shard,
            });
        }

        Ok(shard)
    }

    /// Resolve a key to its shard by prefix
    pub fn resolve_key(&self, key: &str) -> KeyRoute {
        match key.split_once(KEY_SEPARATOR) {
            Some((shard, local_id)) if !local_id.is_empty() && self.shards.contains(shard) => {
                KeyRoute::Shard {
                    shard: shard.to_string(),
                    local_id: local_id.to_string(),
                }
            }
            _ => KeyRoute::Unqualified,
        }
    }

    /// Physical key of `id` on `shard`; already-qualified ids are kept
    pub fn qualify(shard: &str, id: &str) -> String {
        match id.split_once(KEY_SEPARATOR) {
            Some((prefix, _)) if prefix == shard => id.to_string(),
            _ => format!("{shard}{KEY_SEPARATOR}{id}"),
        }
    }
}
