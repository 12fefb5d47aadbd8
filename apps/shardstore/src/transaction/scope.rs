//! Transaction scope state machine
//!
//! `Idle -> Active -> Committed | RolledBack`
//!
//! Enlisted batches are held in memory until [`TransactionScope::complete`]
//! writes them. A scope that is dropped (or rolled back) while active
//! discards them, so nothing reaches the backend.

use crate::backend::DocumentBackend;
use crate::document::Change;
use crate::error::StoreError;
use crate::metrics::{StoreMetrics, UNSHARDED_LABEL};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default scope timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, not yet begun
    Idle,
    /// Accepting enlistments
    Active,
    /// Enlisted batches were written
    Committed,
    /// Enlisted batches were discarded
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Active => "Active",
            Self::Committed => "Committed",
            Self::RolledBack => "RolledBack",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch waiting for the scope to complete
struct Enlistment {
    backend: Arc<dyn DocumentBackend>,
    database: String,
    changes: Vec<Change>,
}

pub struct TransactionScope {
    id: String,
    state: TransactionState,
    timeout: Duration,
    started_at: Option<Instant>,
    enlisted: Vec<Enlistment>,
    metrics: StoreMetrics,
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("enlisted_changes", &self.enlisted_changes())
            .finish()
    }
}

impl Default for TransactionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionScope {
    /// Idle scope; call [`activate`](Self::activate) before use
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: TransactionState::Idle,
            timeout: DEFAULT_TIMEOUT,
            started_at: None,
            enlisted: Vec::new(),
            metrics: StoreMetrics::default(),
        }
    }

    /// Open an active scope
    pub fn begin() -> Self {
        let mut scope = Self::new();
        scope.state = TransactionState::Active;
        scope.started_at = Some(Instant::now());
        debug!(scope_id = %scope.id, "Transaction scope opened");
        scope
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Idle -> Active
    pub fn activate(&mut self) -> Result<(), StoreError> {
        if self.state != TransactionState::Idle {
            return Err(self.invalid_transition(TransactionState::Active));
        }
        self.state = TransactionState::Active;
        self.started_at = Some(Instant::now());
        debug!(scope_id = %self.id, "Transaction scope opened");
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of changes waiting for completion
    pub fn enlisted_changes(&self) -> usize {
        self.enlisted.iter().map(|e| e.changes.len()).sum()
    }

    fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn invalid_transition(&self, to: TransactionState) -> StoreError {
        StoreError::InvalidTransition {
            scope_id: self.id.clone(),
            from: self.state.as_str(),
            to: to.as_str(),
        }
    }

    /// Roll back if the timeout has elapsed
    fn check_timeout(&mut self) -> Result<(), StoreError> {
        let elapsed = self.elapsed();
        if elapsed <= self.timeout {
            return Ok(());
        }

        let discarded = self.discard();
        warn!(
            scope_id = %self.id,
            elapsed_ms = elapsed.as_millis() as u64,
            discarded,
            "Transaction scope timed out"
        );
        Err(StoreError::TransactionTimeout {
            scope_id: self.id.clone(),
            elapsed_ms: elapsed.as_millis() as u64,
            timeout_ms: self.timeout.as_millis() as u64,
        })
    }

    /// Fails unless the scope is active and within its timeout
    pub(crate) fn ensure_accepting(&mut self) -> Result<(), StoreError> {
        if !self.is_active() {
            return Err(self.invalid_transition(TransactionState::Active));
        }
        self.check_timeout()
    }

    /// Hold a batch until completion. Only an active scope accepts batches.
    pub(crate) fn enlist(
        &mut self,
        backend: Arc<dyn DocumentBackend>,
        database: &str,
        changes: Vec<Change>,
    ) -> Result<(), StoreError> {
        self.ensure_accepting()?;

        debug!(
            scope_id = %self.id,
            endpoint = backend.endpoint(),
            database,
            changes = changes.len(),
            "Batch enlisted"
        );

        if !changes.is_empty() {
            self.enlisted.push(Enlistment {
                backend,
                database: database.to_string(),
                changes,
            });
        }
        Ok(())
    }

    /// Write every enlisted batch and commit.
    ///
    /// On a backend failure the scope rolls back and the error is returned;
    /// batches written before the failure are not undone.
    pub async fn complete(&mut self) -> Result<(), StoreError> {
        if !self.is_active() {
            return Err(self.invalid_transition(TransactionState::Committed));
        }
        self.check_timeout()?;

        let enlisted = std::mem::take(&mut self.enlisted);
        let total: usize = enlisted.iter().map(|e| e.changes.len()).sum();

        for enlistment in &enlisted {
            if let Err(e) = enlistment
                .backend
                .apply(&enlistment.database, &enlistment.changes)
                .await
            {
                self.state = TransactionState::RolledBack;
                self.metrics.record_error(&e);
                self.metrics.record_transaction("rolled_back");
                error!(
                    scope_id = %self.id,
                    endpoint = enlistment.backend.endpoint(),
                    error = %e,
                    "Transaction commit failed"
                );
                return Err(e);
            }
            self.metrics
                .record_written(UNSHARDED_LABEL, enlistment.changes.len());
        }

        self.state = TransactionState::Committed;
        self.metrics.record_transaction("committed");
        info!(
            scope_id = %self.id,
            batches = enlisted.len(),
            changes = total,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Transaction committed"
        );
        Ok(())
    }

    /// Discard enlisted batches. Valid from Idle or Active.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        if self.state.is_terminal() {
            return Err(self.invalid_transition(TransactionState::RolledBack));
        }
        let discarded = self.discard();
        info!(scope_id = %self.id, discarded, "Transaction rolled back");
        Ok(())
    }

    fn discard(&mut self) -> usize {
        let discarded = self.enlisted_changes();
        self.enlisted.clear();
        self.state = TransactionState::RolledBack;
        self.metrics.record_transaction("rolled_back");
        discarded
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.is_active() {
            let discarded = self.discard();
            debug!(
                scope_id = %self.id,
                discarded,
                "Transaction scope dropped without completion, rolled back"
            );
        }
    }
}
