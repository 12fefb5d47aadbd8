//! Session: one unit of work against a store
//!
//! Changes are staged in memory and flushed by `save_changes` (immediate) or
//! `save_changes_in` (under a transaction scope).
//!
//! NOTE: a sharded session never enlists in a transaction scope. Each shard's
//! batch is written as soon as `save_changes_in` runs, whether or not the
//! scope is later completed. Writes are not atomic across shards.

use crate::backend::DocumentBackend;
use crate::document::{Change, Document};
use crate::error::{RoutingError, StoreError};
use crate::metrics::{StoreMetrics, UNSHARDED_LABEL};
use crate::shard::{KeyRoute, ShardRouter, StoreRegistry};
use crate::transaction::{TransactionScope, TransactionState};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) enum Target {
    Single {
        backend: Arc<dyn DocumentBackend>,
    },
    Sharded {
        registry: Arc<StoreRegistry>,
        router: Arc<ShardRouter>,
    },
}

pub struct Session {
    database: String,
    target: Target,
    pending: Vec<Change>,
    identity: HashMap<String, Document>,
    metrics: StoreMetrics,
}

impl Session {
    pub(crate) fn new(database: impl Into<String>, target: Target, metrics: StoreMetrics) -> Self {
        let database = database.into();
        debug!(database = %database, sharded = matches!(target, Target::Sharded { .. }), "Session opened");
        Self {
            database,
            target,
            pending: Vec::new(),
            identity: HashMap::new(),
            metrics,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_sharded(&self) -> bool {
        matches!(self.target, Target::Sharded { .. })
    }

    /// Number of staged, unsaved changes
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        match &self.target {
            Target::Single { .. } => Ok(()),
            Target::Sharded { registry, .. } => registry.ensure_open(),
        }
    }

    fn stage(&mut self, change: Change) {
        self.pending.retain(|staged| staged.key() != change.key());
        self.pending.push(change);
    }

    fn staged_delete(&self, key: &str) -> bool {
        self.pending
            .iter()
            .any(|change| !change.is_put() && change.key() == key)
    }

    /// Stage a write. Returns the key the document is stored under, which
    /// for a sharded session is `"<Shard>/<id>"`.
    pub fn store(&mut self, mut document: Document) -> Result<String, StoreError> {
        self.ensure_open()?;

        if let Target::Sharded { router, .. } = &self.target {
            let shard = router.route(&document).map_err(|e| {
                self.metrics.record_routing_failure(&document.collection);
                warn!(key = %document.key, collection = %document.collection, error = %e, "Routing failed");
                StoreError::from(e)
            })?;
            document.key = ShardRouter::qualify(&shard, &document.key);
        }

        let key = document.key.clone();
        debug!(database = %self.database, key = %key, "Document staged");
        self.identity.insert(key.clone(), document.clone());
        self.stage(Change::Put { document });
        Ok(key)
    }

    /// Stage a write of a serde entity
    pub fn store_entity<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        entity: &T,
    ) -> Result<String, StoreError> {
        self.store(Document::from_entity(collection, id, entity)?)
    }

    /// Stage a delete. A sharded session needs a shard-qualified key.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;

        if let Target::Sharded { router, .. } = &self.target {
            if router.resolve_key(key) == KeyRoute::Unqualified {
                return Err(RoutingError::UnqualifiedKey {
                    key: key.to_string(),
                }
                .into());
            }
        }

        self.identity.remove(key);
        self.stage(Change::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Load a document; a missing key is `NotFound`
    pub async fn load(&mut self, key: &str) -> Result<Document, StoreError> {
        self.try_load(key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    /// Load and deserialize into an entity
    pub async fn load_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, StoreError> {
        self.load(key).await?.to_entity()
    }

    /// Load a document; a missing key is `Ok(None)`
    pub async fn try_load(&mut self, key: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;

        if self.staged_delete(key) {
            return Ok(None);
        }
        if let Some(document) = self.identity.get(key) {
            return Ok(Some(document.clone()));
        }

        let found = match &self.target {
            Target::Single { backend } => {
                let found = backend.get(&self.database, key).await.inspect_err(|e| {
                    self.metrics.record_error(e);
                })?;
                match found {
                    Some(_) => self.metrics.record_loaded(UNSHARDED_LABEL),
                    None => self.metrics.record_load_miss(UNSHARDED_LABEL),
                }
                found
            }
            Target::Sharded { registry, router } => match router.resolve_key(key) {
                KeyRoute::Shard { shard, .. } => {
                    load_from_shard(registry, &self.metrics, &shard, &self.database, key).await?
                }
                KeyRoute::Unqualified => {
                    let mut found = None;
                    for shard in registry.shard_names() {
                        found = load_from_shard(registry, &self.metrics, shard, &self.database, key)
                            .await?;
                        if found.is_some() {
                            break;
                        }
                    }
                    found
                }
            },
        };

        if let Some(document) = &found {
            self.identity.insert(key.to_string(), document.clone());
        }
        Ok(found)
    }

    /// Write staged changes now
    pub async fn save_changes(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        match &self.target {
            Target::Single { backend } => {
                backend
                    .apply(&self.database, &self.pending)
                    .await
                    .inspect_err(|e| self.metrics.record_error(e))?;
                self.metrics.record_written(UNSHARDED_LABEL, self.pending.len());
                info!(
                    database = %self.database,
                    endpoint = backend.endpoint(),
                    changes = self.pending.len(),
                    "Changes saved"
                );
                self.pending.clear();
                Ok(())
            }
            Target::Sharded { registry, router } => {
                let registry = Arc::clone(registry);
                let router = Arc::clone(router);
                self.save_sharded(&registry, &router).await
            }
        }
    }

    /// Write staged changes under `scope`.
    ///
    /// Single-shard: an active scope holds the batch until `complete()`; an
    /// idle scope means no transaction and the batch is written now.
    /// Sharded: the batch is always written now (see module docs).
    pub async fn save_changes_in(&mut self, scope: &mut TransactionScope) -> Result<(), StoreError> {
        self.ensure_open()?;

        let backend = match &self.target {
            Target::Single { backend } => Arc::clone(backend),
            Target::Sharded { .. } => {
                if scope.is_active() {
                    warn!(
                        database = %self.database,
                        scope_id = scope.id(),
                        changes = self.pending.len(),
                        "Sharded session does not enlist in transaction scope; writing immediately"
                    );
                }
                return self.save_changes().await;
            }
        };

        if scope.state() == TransactionState::Idle {
            return self.save_changes().await;
        }

        // Staged changes stay in the session when the scope refuses them
        if let Err(e) = scope.ensure_accepting() {
            self.metrics.record_error(&e);
            return Err(e);
        }

        let changes = std::mem::take(&mut self.pending);
        let count = changes.len();
        scope.enlist(backend, &self.database, changes)?;

        debug!(
            database = %self.database,
            scope_id = scope.id(),
            changes = count,
            "Changes deferred to transaction scope"
        );
        Ok(())
    }

    /// Group staged changes by shard and write each group independently.
    /// Groups already written stay written if a later group fails; the
    /// unwritten groups remain staged.
    async fn save_sharded(
        &mut self,
        registry: &StoreRegistry,
        router: &ShardRouter,
    ) -> Result<(), StoreError> {
        let mut batches: BTreeMap<String, Vec<Change>> = BTreeMap::new();
        for change in std::mem::take(&mut self.pending) {
            match router.resolve_key(change.key()) {
                KeyRoute::Shard { shard, .. } => batches.entry(shard).or_default().push(change),
                // store() and delete() only stage qualified keys
                KeyRoute::Unqualified => {
                    return Err(RoutingError::UnqualifiedKey {
                        key: change.key().to_string(),
                    }
                    .into())
                }
            }
        }

        let mut batches = batches.into_iter();
        while let Some((shard, changes)) = batches.next() {
            let Some(backend) = registry.shard(&shard) else {
                return Err(RoutingError::UnmappedShard {
                    key: changes[0].key().to_string(),
                    shard,
                }
                .into());
            };

            match backend.apply(&self.database, &changes).await {
                Ok(()) => {
                    registry.state().record_write(&shard, changes.len());
                    self.metrics.record_written(&shard, changes.len());
                    info!(
                        database = %self.database,
                        shard = %shard,
                        changes = changes.len(),
                        "Shard changes saved"
                    );
                }
                Err(e) => {
                    registry.state().record_failure(&shard, e.is_transient());
                    self.metrics.record_error(&e);
                    warn!(database = %self.database, shard = %shard, error = %e, "Shard write failed");
                    self.pending = changes;
                    self.pending.extend(batches.flat_map(|(_, rest)| rest));
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

async fn load_from_shard(
    registry: &StoreRegistry,
    metrics: &StoreMetrics,
    shard: &str,
    database: &str,
    key: &str,
) -> Result<Option<Document>, StoreError> {
    let backend = registry.shard(shard).ok_or_else(|| RoutingError::UnmappedShard {
        key: key.to_string(),
        shard: shard.to_string(),
    })?;

    match backend.get(database, key).await {
        Ok(found) => {
            registry.state().record_load(shard, found.is_some());
            match found {
                Some(_) => metrics.record_loaded(shard),
                None => metrics.record_load_miss(shard),
            }
            Ok(found)
        }
        Err(e) => {
            registry.state().record_failure(shard, e.is_transient());
            metrics.record_error(&e);
            Err(e)
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                database = %self.database,
                discarded = self.pending.len(),
                "Session dropped with unsaved changes"
            );
        }
    }
}
