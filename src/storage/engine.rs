//! Sharded Key-Value Engine with TTL Support
//!
//! This module implements the core storage engine for snapkv: a fixed set
//! of shards, each a `RwLock<HashMap>` from key to [`Entry`], plus the
//! store-level operations (`put`, `get`, `delete`, `cleanup`, `to_disk`).
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are routed across
//!    shards to reduce contention. The shard count is fixed at
//!    construction.
//! 2. **Stable Routing**: A key's shard is `crc32(key) % N`. CRC-32/IEEE
//!    is stable across processes, so a store reloaded from disk with the
//!    same shard count sees every key in the shard it was written to.
//! 3. **Policy-Free Shards**: A shard only guards its map. TTL policy
//!    (what counts as expired) is applied by the store on read and by
//!    `evict` during cleanup, never inside the shard lookup itself.
//! 4. **Read-Side Laziness Without Mutation**: `get` reports an expired
//!    entry as an error but does not remove it; removal is the cleanup
//!    worker's job.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KVStore                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A caller holds at most one shard lock at a time; `cleanup` and
//! `to_disk` walk the shards in index order without holding any lock
//! between them, so neither is atomic across shards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::storage::errors::StoreError;
use crate::storage::snapshot;

/// TTL sentinel meaning "this entry never expires".
pub const NO_EXPIRY: f64 = -1.0;

/// Wall-clock milliseconds since the Unix epoch.
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is set before the Unix epoch")
        .as_millis() as i64
}

/// A stored record: opaque JSON value, insertion timestamp, TTL.
///
/// The TTL is kept in milliseconds as a float because the public API
/// accepts fractional seconds; [`NO_EXPIRY`] marks a persistent entry.
/// The serialized field names (`value`, `timestamp`, `ttl`) are part of
/// the snapshot file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The opaque payload. The store never interprets it.
    pub value: Value,
    /// Insertion time, wall-clock milliseconds.
    pub timestamp: i64,
    /// Milliseconds-to-live; `<= 0` means the entry never expires.
    pub ttl: f64,
}

impl Entry {
    /// Creates an entry timestamped now. `ttl_ms` uses the storage-layer
    /// convention ([`NO_EXPIRY`] for persistent entries).
    pub fn new(value: Value, ttl_ms: f64) -> Self {
        Self {
            value,
            timestamp: now_ms(),
            ttl: ttl_ms,
        }
    }

    /// Whether this entry is past its TTL at `now_ms`.
    #[inline]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.ttl > 0.0 && (now_ms - self.timestamp) as f64 > self.ttl
    }

    /// Elapsed milliseconds since insertion at `now_ms`.
    #[inline]
    pub fn elapsed_at(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }
}

/// One partition of the keyspace: one map, one lock.
///
/// Lock poisoning is unrecoverable here (a panic while holding a shard
/// lock means the map may be torn), so lock acquisition unwraps.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<String, Entry>>,
}

impl Shard {
    fn new() -> Self {
        Self::default()
    }

    fn with_data(data: HashMap<String, Entry>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Inserts or overwrites under the write lock.
    fn insert(&self, key: String, entry: Entry) {
        let mut data = self.data.write().unwrap();
        data.insert(key, entry);
    }

    /// Returns a snapshot of the stored entry, if any. No expiry check:
    /// the caller owns the policy.
    fn get(&self, key: &str) -> Option<Entry> {
        let data = self.data.read().unwrap();
        data.get(key).cloned()
    }

    /// Removes the key if present; a missing key is not an error.
    fn remove(&self, key: &str) {
        let mut data = self.data.write().unwrap();
        data.remove(key);
    }

    /// Removes every entry expired at `now_ms`, returning how many were
    /// dropped. Safe on an empty shard.
    fn evict(&self, now_ms: i64) -> usize {
        let mut data = self.data.write().unwrap();
        if data.is_empty() {
            return 0;
        }
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired_at(now_ms));
        before - data.len()
    }

    fn len(&self) -> usize {
        let data = self.data.read().unwrap();
        data.len()
    }

    /// Writes this shard's snapshot to `path` as a single file
    /// replacement. An empty shard writes nothing (the previous snapshot,
    /// if any, is left untouched).
    ///
    /// Holds the read lock for the duration, which pins out writers while
    /// the map is serialized; snapshots run on a timer and shards are
    /// small, so the pause is acceptable.
    fn flush(&self, path: &Path) -> Result<(), StoreError> {
        let data = self.data.read().unwrap();
        if data.is_empty() {
            return Ok(());
        }
        let bytes = snapshot::encode(&data)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// The sharded key-value store.
///
/// Designed to be wrapped in an `Arc` and shared between the HTTP
/// handlers and the background workers; every operation takes `&self`.
///
/// # Example
///
/// ```
/// use snapkv::storage::KVStore;
/// use serde_json::json;
///
/// let store = KVStore::new(3, ".snapkv");
///
/// store.put("name", json!("snapkv"), None);
/// assert_eq!(store.get("name").unwrap(), json!("snapkv"));
///
/// store.delete("name");
/// assert!(store.get("name").is_err());
/// ```
#[derive(Debug)]
pub struct KVStore {
    /// Fixed-length shard list; the length never changes after
    /// construction.
    shards: Vec<Shard>,

    /// Directory the snapshot files live in. Created by the caller.
    directory: PathBuf,

    /// Cardinality of each shard at its last flush. Only `to_disk`
    /// writes these; a shard whose current length matches is skipped.
    flushed_sizes: Vec<AtomicUsize>,
}

impl KVStore {
    /// Creates a store with `num_shards` empty shards. The snapshot
    /// directory is not created here; that is the caller's
    /// responsibility.
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is zero.
    pub fn new(num_shards: usize, directory: impl Into<PathBuf>) -> Self {
        assert!(num_shards > 0, "store needs at least one shard");
        Self {
            shards: (0..num_shards).map(|_| Shard::new()).collect(),
            directory: directory.into(),
            flushed_sizes: (0..num_shards).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Reconstructs a store from the snapshot files in `directory`.
    ///
    /// Shard `i` is loaded from `directory/shard-<i>`; a missing file
    /// yields an empty shard. A file that cannot be read, fails its
    /// integrity check, or does not deserialize fails the whole load
    /// with [`StoreError::UnloadableShard`].
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is zero.
    pub fn from_disk(num_shards: usize, directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        assert!(num_shards > 0, "store needs at least one shard");
        let directory = directory.into();
        let mut shards = Vec::with_capacity(num_shards);
        let mut flushed_sizes = Vec::with_capacity(num_shards);

        for i in 0..num_shards {
            let path = directory.join(format!("shard-{i}"));
            if !path.exists() {
                info!(shard = i, "snapshot file missing, starting with an empty shard");
                shards.push(Shard::new());
                flushed_sizes.push(AtomicUsize::new(0));
                continue;
            }
            let raw = fs::read(&path).map_err(|e| StoreError::UnloadableShard {
                shard: i,
                reason: e.to_string(),
            })?;
            let entries = snapshot::decode(&raw).map_err(|e| StoreError::UnloadableShard {
                shard: i,
                reason: e.to_string(),
            })?;
            flushed_sizes.push(AtomicUsize::new(entries.len()));
            shards.push(Shard::with_data(entries));
        }

        Ok(Self {
            shards,
            directory,
            flushed_sizes,
        })
    }

    /// Routes a key to its shard: `crc32(key) % N`. Deterministic for
    /// the life of the process and across restarts with the same shard
    /// count.
    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        crc32fast::hash(key.as_bytes()) as usize % self.shards.len()
    }

    fn shard_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("shard-{index}"))
    }

    /// Inserts or overwrites a key. `ttl` is in seconds (fractional
    /// allowed); `None` means the entry never expires. Overwriting
    /// refreshes both the timestamp and the TTL.
    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Option<f64>) {
        let key = key.into();
        let ttl_ms = match ttl {
            None => NO_EXPIRY,
            Some(seconds) => seconds * 1000.0,
        };
        let shard = &self.shards[self.shard_index(&key)];
        shard.insert(key, Entry::new(value, ttl_ms));
    }

    /// Returns the value stored under `key`.
    ///
    /// A missing key is [`StoreError::KeyNotFound`]; a present but
    /// expired entry is [`StoreError::Expired`]. An expired entry is NOT
    /// removed here; the cleanup worker reclaims it.
    pub fn get(&self, key: &str) -> Result<Value, StoreError> {
        let now = now_ms();
        let shard = &self.shards[self.shard_index(key)];
        match shard.get(key) {
            None => Err(StoreError::KeyNotFound {
                key: key.to_string(),
            }),
            Some(entry) if entry.is_expired_at(now) => Err(StoreError::Expired {
                key: key.to_string(),
                ttl_ms: entry.ttl,
                elapsed_ms: entry.elapsed_at(now),
            }),
            Some(entry) => Ok(entry.value),
        }
    }

    /// Removes `key` if present. Deleting a missing key is a no-op.
    pub fn delete(&self, key: &str) {
        let shard = &self.shards[self.shard_index(key)];
        shard.remove(key);
    }

    /// Evicts expired entries from every shard, one shard lock at a
    /// time, in index order. Returns the total number of entries
    /// removed. Not atomic across shards: reads and writes may
    /// interleave between shard visits.
    pub fn cleanup(&self) -> usize {
        let now = now_ms();
        self.shards.iter().map(|shard| shard.evict(now)).sum()
    }

    /// Flushes changed shards to their snapshot files, in index order.
    ///
    /// A shard whose cardinality matches its last flushed cardinality is
    /// skipped. This misses in-place overwrites that keep the length
    /// constant; the behavior is kept to match the change-detection
    /// contract of the snapshot files. The first shard that fails aborts
    /// the pass; shards already flushed stay on disk.
    pub fn to_disk(&self) -> Result<(), StoreError> {
        for (i, shard) in self.shards.iter().enumerate() {
            let len = shard.len();
            if len == self.flushed_sizes[i].load(Ordering::Relaxed) {
                // no new content, keep the file as-is
                continue;
            }
            self.flushed_sizes[i].store(len, Ordering::Relaxed);
            shard.flush(&self.shard_path(i))?;
        }
        Ok(())
    }

    /// Total number of entries across all shards, expired ones included.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of shards, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
