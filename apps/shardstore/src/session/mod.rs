//! Stores and sessions
//!
//! A [`DocumentStore`] talks to one backend; a [`ShardedDocumentStore`]
//! routes documents across the shards of a registry. Both hand out
//! [`Session`]s, the unit of work for store/load/delete/save_changes.

mod store;
mod unit_of_work;

pub use store::{DocumentStore, ShardedDocumentStore};
pub use unit_of_work::Session;
