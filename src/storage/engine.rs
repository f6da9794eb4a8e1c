//! In-Memory Key-Value Engine
//!
//! Keys and values are opaque byte strings. The key space is split into
//! [`SHARD_COUNT`] independently locked maps; a key always lands in the
//! shard picked by its hash, so every operation takes exactly one lock.
//!
//! The reactor thread is the only caller in the server, but the engine is
//! `Sync` and can be shared with other threads (the benches do).
//!
//! ```text
//!   key ──hash──> shard i ──RwLock──> HashMap<Bytes, Bytes>
//! ```
//!
//! Concurrent writers to the same key resolve last-writer-wins.

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of independently locked partitions of the key space.
pub const SHARD_COUNT: usize = 64;

/// The storage operations the command dispatcher relies on.
///
/// Implementations must be safe to call from several threads at once.
/// Each call touches exactly one key.
pub trait Storage: Send + Sync {
    /// Returns the value for `key`, or `None` if it is absent.
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: Bytes, value: Bytes);

    /// Removes `key`. Returns `true` if it existed.
    fn delete(&self, key: &[u8]) -> bool;
}

type Map = HashMap<Bytes, Bytes>;

#[derive(Default)]
struct Shard(RwLock<Map>);

impl Shard {
    // Poisoning is ignored: every critical section is a single map operation.
    fn read(&self) -> RwLockReadGuard<'_, Map> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Snapshot of the engine's operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Keys currently stored
    pub keys: u64,
    pub gets: u64,
    pub sets: u64,
    pub dels: u64,
}

#[derive(Default)]
struct Counters {
    keys: AtomicU64,
    gets: AtomicU64,
    sets: AtomicU64,
    dels: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StorageStats {
        StorageStats {
            keys: self.keys.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            dels: self.dels.load(Ordering::Relaxed),
        }
    }
}

/// Sharded in-memory store.
///
/// # Example
///
/// ```
/// use pollkv::storage::{Storage, StorageEngine};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.set(Bytes::from("lang"), Bytes::from("rust"));
/// assert_eq!(engine.get(b"lang"), Some(Bytes::from("rust")));
///
/// assert!(engine.delete(b"lang"));
/// assert!(!engine.delete(b"lang"));
/// ```
pub struct StorageEngine {
    shards: Box<[Shard]>,
    hasher: RandomState,
    counters: Counters,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Shard::default()).collect(),
            hasher: RandomState::new(),
            counters: Counters::default(),
        }
    }

    fn shard(&self, key: &[u8]) -> &Shard {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Number of stored keys.
    pub fn len(&self) -> u64 {
        self.counters.keys.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        self.counters.snapshot()
    }
}

impl Storage for StorageEngine {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        Counters::bump(&self.counters.gets);
        self.shard(key).read().get(key).cloned()
    }

    fn set(&self, key: Bytes, value: Bytes) {
        Counters::bump(&self.counters.sets);
        let previous = self.shard(&key).write().insert(key, value);
        if previous.is_none() {
            Counters::bump(&self.counters.keys);
        }
    }

    fn delete(&self, key: &[u8]) -> bool {
        Counters::bump(&self.counters.dels);
        let removed = self.shard(key).write().remove(key).is_some();
        if removed {
            self.counters.keys.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }
}
