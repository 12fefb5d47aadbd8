//! Shard management module
//!
//! Registry of named shard backends, document routing, and per-shard state.

mod registry;
mod router;
mod state;

pub use registry::{StoreRegistry, StoreRegistryBuilder};
pub use router::{KeyRoute, ShardKeyFn, ShardRouter, KEY_SEPARATOR};
pub use state::{ShardHealth, ShardState};
