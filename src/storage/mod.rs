//! Storage Module
//!
//! The command dispatcher talks to storage only through the [`Storage`]
//! trait. [`StorageEngine`] is the in-memory implementation the server
//! ships with. Nothing is persisted and keys never expire.

pub mod engine;

pub use engine::{Storage, StorageEngine, StorageStats, SHARD_COUNT};
