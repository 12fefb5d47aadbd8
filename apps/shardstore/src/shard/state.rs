//! Shard state tracking
//!
//! Client-side view of each shard: last known reachability plus read/write
//! counters, updated by sessions as they talk to backends.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reachability of a shard as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardHealth {
    /// No request has completed yet
    Unknown,
    /// Last request reached the backend
    Reachable,
    /// Last request failed with a transient error (connect, timeout, 5xx)
    Unreachable,
}

impl ShardHealth {
    /// Unknown counts as healthy until proven otherwise
    pub fn is_healthy(&self) -> bool {
        !matches!(self, ShardHealth::Unreachable)
    }
}

/// State for a single shard
#[derive(Debug)]
pub struct ShardStateEntry {
    pub health: ShardHealth,
    pub documents_written: AtomicU64,
    pub documents_loaded: AtomicU64,
    pub failed_requests: AtomicU64,
}

impl Default for ShardStateEntry {
    fn default() -> Self {
        Self {
            health: ShardHealth::Unknown,
            documents_written: AtomicU64::new(0),
            documents_loaded: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }
}

/// Shared state across all shards of a registry
#[derive(Debug, Clone)]
pub struct ShardState {
    inner: Arc<DashMap<String, ShardStateEntry>>,
}

impl ShardState {
    pub fn new<I, S>(shard_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shards = DashMap::new();
        for name in shard_names {
            shards.insert(name.into(), ShardStateEntry::default());
        }

        Self {
            inner: Arc::new(shards),
        }
    }

    fn mark_reachable(&self, shard: &str) {
        if let Some(mut entry) = self.inner.get_mut(shard) {
            entry.health = ShardHealth::Reachable;
        }
    }

    /// Record a successful batch write
    pub fn record_write(&self, shard: &str, documents: usize) {
        if let Some(entry) = self.inner.get(shard) {
            entry
                .documents_written
                .fetch_add(documents as u64, Ordering::Relaxed);
        }
        self.mark_reachable(shard);
    }

    /// Record a completed load (hit or miss)
    pub fn record_load(&self, shard: &str, found: bool) {
        if found {
            if let Some(entry) = self.inner.get(shard) {
                entry.documents_loaded.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.mark_reachable(shard);
    }

    /// Record a failed request; transient failures mark the shard unreachable
    pub fn record_failure(&self, shard: &str, transient: bool) {
        if let Some(mut entry) = self.inner.get_mut(shard) {
            entry.failed_requests.fetch_add(1, Ordering::Relaxed);
            if transient {
                entry.health = ShardHealth::Unreachable;
            }
        }
    }

    pub fn get_health(&self, shard: &str) -> Option<ShardHealth> {
        self.inner.get(shard).map(|e| e.health)
    }

    pub fn documents_written(&self, shard: &str) -> u64 {
        self.inner
            .get(shard)
            .map_or(0, |e| e.documents_written.load(Ordering::Relaxed))
    }

    pub fn documents_loaded(&self, shard: &str) -> u64 {
        self.inner
            .get(shard)
            .map_or(0, |e| e.documents_loaded.load(Ordering::Relaxed))
    }

    pub fn failed_requests(&self, shard: &str) -> u64 {
        self.inner
            .get(shard)
            .map_or(0, |e| e.failed_requests.load(Ordering::Relaxed))
    }

    /// Total documents written across all shards
    pub fn total_documents_written(&self) -> u64 {
        self.inner
            .iter()
            .map(|e| e.documents_written.load(Ordering::Relaxed))
            .sum()
    }

    pub fn healthy_shards(&self) -> usize {
        self.inner.iter().filter(|e| e.health.is_healthy()).count()
    }

    pub fn shard_count(&self) -> usize {
        self.inner.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy_shards() == self.shard_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_shards_start_unknown_and_healthy() {
        let state = ShardState::new(["Africa", "Europe"]);
        assert_eq!(state.shard_count(), 2);
        assert_eq!(state.get_health("Africa"), Some(ShardHealth::Unknown));
        assert!(state.is_healthy());
        assert_eq!(state.get_health("Asia"), None);
    }

    #[test]
    fn writes_and_loads_accumulate() {
        let state = ShardState::new(["Africa", "Europe"]);
        state.record_write("Africa", 2);
        state.record_write("Europe", 1);
        state.record_load("Africa", true);
        state.record_load("Africa", false);

        assert_eq!(state.documents_written("Africa"), 2);
        assert_eq!(state.total_documents_written(), 3);
        assert_eq!(state.documents_loaded("Africa"), 1);
        assert_eq!(state.get_health("Africa"), Some(ShardHealth::Reachable));
    }

    #[test]
    fn transient_failure_marks_unreachable_until_next_success() {
        let state = ShardState::new(["Africa"]);
        state.record_failure("Africa", true);
        assert_eq!(state.get_health("Africa"), Some(ShardHealth::Unreachable));
        assert!(!state.is_healthy());
        assert_eq!(state.failed_requests("Africa"), 1);

        state.record_load("Africa", true);
        assert!(state.is_healthy());
    }

    #[test]
    fn status_failure_keeps_health() {
        let state = ShardState::new(["Africa"]);
        state.record_failure("Africa", false);
        assert_eq!(state.get_health("Africa"), Some(ShardHealth::Unknown));
        assert_eq!(state.failed_requests("Africa"), 1);
    }
}
