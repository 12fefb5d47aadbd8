//! Document model
//!
//! Documents and the change records that travel to backends in a batch.

mod model;

pub use model::{Change, Document};
