//! Store/transaction scenarios over in-process backends
//!
//! The plain store and the single "Africa" shard share one backend, the way
//! both point at the same node URL in a local setup.

use serde::{Deserialize, Serialize};
use shardstore::{
    Document, DocumentBackend, DocumentStore, InMemoryBackend, ShardedDocumentStore, StoreError,
    StoreRegistry, TransactionScope, TransactionState,
};
use std::sync::Arc;

const DATABASE: &str = "tenant";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Customer {
    name: String,
    region: String,
}

fn customer(region: &str) -> Customer {
    Customer {
        name: "Customer 1".to_string(),
        region: region.to_string(),
    }
}

struct Fixture {
    node: Arc<InMemoryBackend>,
    normal: DocumentStore,
    sharded: ShardedDocumentStore,
}

fn fixture() -> Fixture {
    let node = Arc::new(InMemoryBackend::new("memory://localhost:8092"));
    let registry = Arc::new(
        StoreRegistry::builder()
            .shard("Africa", node.clone())
            .unwrap()
            .build()
            .unwrap(),
    );
    let router = registry.router().sharding_on_field("Customers", "Region");

    Fixture {
        normal: DocumentStore::new(node.clone()),
        sharded: ShardedDocumentStore::new(registry, router).unwrap(),
        node,
    }
}

#[tokio::test]
async fn store_without_scope_is_loadable() {
    let f = fixture();
    let doc = Document::from_entity("Customers", "x", &customer("Africa")).unwrap();

    let mut session = f.normal.open_session(DATABASE);
    session.store(doc.clone()).unwrap();
    session.save_changes().await.unwrap();

    let mut fresh = f.normal.open_session(DATABASE);
    assert_eq!(fresh.load("x").await.unwrap(), doc);
}

#[tokio::test]
async fn normal_store_in_completed_scope_is_visible() {
    let f = fixture();
    let mut scope = TransactionScope::begin();
    {
        let mut session = f.normal.open_session(DATABASE);
        session
            .store_entity("Customers", "x", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
    }
    scope.complete().await.unwrap();

    let mut session = f.normal.open_session(DATABASE);
    assert!(session.try_load("x").await.unwrap().is_some());
}

#[tokio::test]
async fn normal_store_in_uncompleted_scope_is_not_visible() {
    let f = fixture();
    {
        let mut scope = TransactionScope::begin();
        let mut session = f.normal.open_session(DATABASE);
        session
            .store_entity("Customers", "x", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
        // scope dropped without complete()
    }

    let mut session = f.normal.open_session(DATABASE);
    let err = session.load("x").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref key } if key == "x"));
    assert!(f.node.is_empty());
}

#[tokio::test]
async fn sharded_store_without_scope_is_loadable_by_prefixed_key() {
    let f = fixture();
    let mut session = f.sharded.open_session(DATABASE).unwrap();
    let key = session
        .store_entity("Customers", "y", &customer("Africa"))
        .unwrap();
    session.save_changes().await.unwrap();
    assert_eq!(key, "Africa/y");

    let mut plain = f.normal.open_session(DATABASE);
    let loaded: Customer = plain.load_as("Africa/y").await.unwrap();
    assert_eq!(loaded, customer("Africa"));

    let mut routed = f.sharded.open_session(DATABASE).unwrap();
    assert!(routed.try_load("Africa/y").await.unwrap().is_some());
}

#[tokio::test]
async fn sharded_store_in_uncompleted_scope_is_still_visible() {
    let f = fixture();
    {
        let mut scope = TransactionScope::begin();
        let mut session = f.sharded.open_session(DATABASE).unwrap();
        session
            .store_entity("Customers", "z", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
        scope.rollback().unwrap();
        assert_eq!(scope.state(), TransactionState::RolledBack);
    }

    // Non-atomic across shards: the write committed on save_changes_in
    let mut session = f.normal.open_session(DATABASE);
    assert!(session.try_load("Africa/z").await.unwrap().is_some());
}

#[tokio::test]
async fn sharded_store_in_completed_scope_is_visible() {
    let f = fixture();
    let mut scope = TransactionScope::begin();
    {
        let mut session = f.sharded.open_session(DATABASE).unwrap();
        session
            .store_entity("Customers", "z", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
    }
    scope.complete().await.unwrap();
    assert_eq!(scope.state(), TransactionState::Committed);

    let mut session = f.normal.open_session(DATABASE);
    assert!(session.try_load("Africa/z").await.unwrap().is_some());
}

#[tokio::test]
async fn full_walkthrough_leaves_all_three_documents() {
    let f = fixture();

    let mut scope = TransactionScope::begin();
    {
        let mut session = f.normal.open_session(DATABASE);
        session
            .store_entity("Customers", "x", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
    }
    scope.complete().await.unwrap();

    {
        let mut session = f.sharded.open_session(DATABASE).unwrap();
        session
            .store_entity("Customers", "y", &customer("Africa"))
            .unwrap();
        session.save_changes().await.unwrap();
    }

    let mut scope = TransactionScope::begin();
    {
        let mut session = f.sharded.open_session(DATABASE).unwrap();
        session
            .store_entity("Customers", "z", &customer("Africa"))
            .unwrap();
        session.save_changes_in(&mut scope).await.unwrap();
    }
    scope.complete().await.unwrap();

    let mut session = f.normal.open_session(DATABASE);
    for key in ["x", "Africa/y", "Africa/z"] {
        assert!(session.try_load(key).await.unwrap().is_some(), "{key} missing");
    }
    assert_eq!(f.node.count(DATABASE), 3);
}

#[tokio::test]
async fn multi_shard_writes_land_on_their_own_shards() {
    let africa = Arc::new(InMemoryBackend::new("memory://africa"));
    let europe = Arc::new(InMemoryBackend::new("memory://europe"));
    let registry = Arc::new(
        StoreRegistry::builder()
            .shard("Africa", africa.clone())
            .unwrap()
            .shard("Europe", europe.clone())
            .unwrap()
            .build()
            .unwrap(),
    );
    let router = registry.router().sharding_on_field("Customers", "Region");
    let store = ShardedDocumentStore::new(Arc::clone(&registry), router).unwrap();

    let mut scope = TransactionScope::begin();
    let mut session = store.open_session(DATABASE).unwrap();
    session
        .store_entity("Customers", "a", &customer("Africa"))
        .unwrap();
    session
        .store_entity("Customers", "e", &customer("Europe"))
        .unwrap();
    session.save_changes_in(&mut scope).await.unwrap();
    drop(scope);

    assert!(africa.get("tenant", "Africa/a").await.unwrap().is_some());
    assert!(europe.get("tenant", "Europe/e").await.unwrap().is_some());
    assert!(africa.get("tenant", "Europe/e").await.unwrap().is_none());
    assert_eq!(registry.state().documents_written("Africa"), 1);
    assert_eq!(registry.state().documents_written("Europe"), 1);
}

#[tokio::test]
async fn unroutable_document_is_rejected() {
    let f = fixture();
    let mut session = f.sharded.open_session(DATABASE).unwrap();

    let err = session
        .store(Document::new("q", "Customers"))
        .unwrap_err();
    assert_eq!(err.error_type_label(), "routing");

    let err = session
        .store_entity("Customers", "q", &customer("Antarctica"))
        .unwrap_err();
    assert!(err.to_string().contains("Antarctica"));
}
