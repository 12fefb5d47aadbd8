//! Backend that answers every request with 503

use super::DocumentBackend;
use crate::document::{Change, Document};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) struct UnavailableBackend {
    name: String,
    calls: AtomicU32,
}

impl UnavailableBackend {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn refuse(&self) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StoreError::BackendStatus {
            endpoint: self.name.clone(),
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl DocumentBackend for UnavailableBackend {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn get(&self, _database: &str, _key: &str) -> Result<Option<Document>, StoreError> {
        Err(self.refuse())
    }

    async fn apply(&self, _database: &str, _changes: &[Change]) -> Result<(), StoreError> {
        Err(self.refuse())
    }
}
