//! In-process backend
//!
//! Storage of the document node, and a stand-in for a remote endpoint in
//! tests and local runs.

use super::DocumentBackend;
use crate::document::{Change, Document};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Documents keyed by `(database, key)`
#[derive(Debug)]
pub struct InMemoryBackend {
    name: String,
    documents: DashMap<(String, String), Document>,
}

impl InMemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: DashMap::new(),
        }
    }

    pub fn get_document(&self, database: &str, key: &str) -> Option<Document> {
        self.documents
            .get(&(database.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Apply changes without going through the trait (node handlers use this)
    pub fn apply_changes(&self, database: &str, changes: &[Change]) -> usize {
        for change in changes {
            match change {
                Change::Put { document } => {
                    self.documents
                        .insert((database.to_string(), document.key.clone()), document.clone());
                }
                Change::Delete { key } => {
                    self.documents.remove(&(database.to_string(), key.clone()));
                }
            }
        }
        changes.len()
    }

    /// Remove one document; returns whether it existed
    pub fn remove(&self, database: &str, key: &str) -> bool {
        self.documents
            .remove(&(database.to_string(), key.to_string()))
            .is_some()
    }

    pub fn contains(&self, database: &str, key: &str) -> bool {
        self.documents
            .contains_key(&(database.to_string(), key.to_string()))
    }

    /// Total documents across all databases
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents in one database
    pub fn count(&self, database: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == database)
            .count()
    }

    /// Distinct database names holding at least one document
    pub fn databases(&self) -> BTreeSet<String> {
        self.documents
            .iter()
            .map(|entry| entry.key().0.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn get(&self, database: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.get_document(database, key))
    }

    async fn apply(&self, database: &str, changes: &[Change]) -> Result<(), StoreError> {
        self.apply_changes(database, changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_within_database() {
        let backend = InMemoryBackend::new("memory://test");
        let doc = Document::new("x", "Customers").with_field("Region", "Africa");

        backend
            .apply("tenant", &[Change::Put { document: doc.clone() }])
            .await
            .unwrap();

        assert_eq!(backend.get("tenant", "x").await.unwrap(), Some(doc));
        assert_eq!(backend.get("other", "x").await.unwrap(), None);
        assert_eq!(backend.count("tenant"), 1);
        assert_eq!(backend.count("other"), 0);
    }

    #[tokio::test]
    async fn changes_apply_in_order() {
        let backend = InMemoryBackend::new("memory://test");
        let changes = vec![
            Change::Put {
                document: Document::new("x", "Customers"),
            },
            Change::Delete { key: "x".to_string() },
            Change::Put {
                document: Document::new("y", "Customers"),
            },
        ];

        backend.apply("tenant", &changes).await.unwrap();

        assert!(!backend.contains("tenant", "x"));
        assert!(backend.contains("tenant", "y"));
        assert_eq!(backend.databases().into_iter().collect::<Vec<_>>(), vec!["tenant"]);
    }

    #[test]
    fn remove_reports_existence() {
        let backend = InMemoryBackend::new("memory://test");
        backend.apply_changes(
            "tenant",
            &[Change::Put {
                document: Document::new("x", "Customers"),
            }],
        );
        assert!(backend.remove("tenant", "x"));
        assert!(!backend.remove("tenant", "x"));
        assert!(backend.is_empty());
    }
}
