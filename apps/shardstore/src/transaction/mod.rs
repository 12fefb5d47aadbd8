//! Transaction coordination
//!
//! Scopes are explicit handles passed to `Session::save_changes_in`; there is
//! no thread-local ambient transaction. Single-shard sessions enlist their
//! batches with the scope, sharded sessions write through immediately.

mod scope;

pub use scope::{TransactionScope, TransactionState, DEFAULT_TIMEOUT};
