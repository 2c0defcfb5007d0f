//! Sharded, capacity-weighted, refcounted LRU cache (C3).
//!
//! Keys are hashed into one of `shard_count` independent shards, each with
//! its own mutex, LRU ordering and byte budget, so unrelated keys never
//! contend on the same lock. Eviction is byte-weighted rather than
//! entry-counted: every cached value reports its own [`CacheWeight`], and a
//! shard evicts its least-recently-used entries until a new insert fits
//! under `capacity_bytes / shard_count`.
//!
//! [`CachePriority::Durable`] entries are preferred for retention: a shard
//! only evicts a durable entry once every normal entry in it has already
//! been evicted and the insert still doesn't fit.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use std::hash::{BuildHasherDefault, Hasher};

/// Relative retention priority of a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePriority {
    /// Evicted first under memory pressure.
    Normal,
    /// Evicted only once no normal entry remains in the shard.
    Durable,
}

/// A value that can report its own cache footprint in bytes.
pub trait CacheWeight {
    /// Approximate heap footprint charged against the shard's byte budget.
    fn cache_weight(&self) -> u64;
}

impl CacheWeight for Vec<u8> {
    fn cache_weight(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: CacheWeight> CacheWeight for Arc<T> {
    fn cache_weight(&self) -> u64 {
        (**self).cache_weight()
    }
}

struct Entry<V> {
    value: Arc<V>,
    weight: u64,
    priority: CachePriority,
}

type ShardHasher = BuildHasherDefault<FxHasher>;

struct Shard<K, V> {
    entries: IndexMap<K, Entry<V>, ShardHasher>,
    used_bytes: u64,
    capacity_bytes: u64,
}

impl<K: Hash + Eq, V> Shard<K, V> {
    fn new(capacity_bytes: u64) -> Self {
        Self {
            entries: IndexMap::with_hasher(ShardHasher::default()),
            used_bytes: 0,
            capacity_bytes,
        }
    }

    /// Evicts normal-priority entries oldest-first, then durable entries if
    /// that still isn't enough, until `needed` additional bytes fit.
    fn make_room(&mut self, needed: u64, evictions: &AtomicU64) {
        // An entry heavier than the whole shard budget still gets inserted;
        // the loop below empties the shard and the caller runs over budget
        // rather than rejecting the write.
        for pass_priority in [CachePriority::Normal, CachePriority::Durable] {
            let mut idx = 0;
            while self.used_bytes + needed > self.capacity_bytes && idx < self.entries.len() {
                if self.entries[idx].priority == pass_priority {
                    let (_, entry) = self.entries.shift_remove_index(idx).expect("idx in bounds");
                    self.used_bytes -= entry.weight;
                    evictions.fetch_add(1, Ordering::Relaxed);
                } else {
                    idx += 1;
                }
            }
        }
    }

    fn touch(&mut self, key: &K) -> Option<Arc<V>>
    where
        K: Clone,
    {
        let (_, k, entry) = self.entries.shift_remove_full(key)?;
        let value = entry.value.clone();
        self.entries.insert(k, entry);
        Some(value)
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found no entry.
    pub misses: u64,
    /// Entries evicted to make room for a new insert.
    pub evictions: u64,
    /// Total bytes currently resident across all shards.
    pub memory_usage: u64,
    /// Total configured capacity across all shards.
    pub capacity: u64,
    /// Number of resident entries across all shards.
    pub len: usize,
}

/// Sharded, weighted, refcounted LRU cache.
pub struct SharedCache<K, V> {
    shards: Vec<Mutex<Shard<K, V>>>,
    shard_mask: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Hash + Eq + Clone, V: CacheWeight> SharedCache<K, V> {
    /// Builds a cache with `capacity_bytes` split evenly across
    /// `shard_count` shards. `shard_count` is rounded up to the next power
    /// of two (minimum 1) so shard selection is a plain mask.
    #[must_use]
    pub fn new(capacity_bytes: u64, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1).next_power_of_two();
        let per_shard = capacity_bytes / shard_count as u64;
        let shards = (0..shard_count)
            .map(|_| Mutex::new(Shard::new(per_shard)))
            .collect();
        Self {
            shards,
            shard_mask: shard_count as u64 - 1,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() & self.shard_mask) as usize
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let idx = self.shard_index(key);
        let mut shard = self.shards[idx].lock();
        match shard.touch(key) {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts `value` under `key` at the given priority, evicting older
    /// entries in its shard as needed, and returns the shared handle.
    pub fn insert(&self, key: K, value: V, priority: CachePriority) -> Arc<V> {
        let weight = value.cache_weight();
        let value = Arc::new(value);
        let idx = self.shard_index(&key);
        let mut shard = self.shards[idx].lock();
        if let Some(old) = shard.entries.shift_remove(&key) {
            shard.used_bytes -= old.weight;
        }
        shard.make_room(weight, &self.evictions);
        shard.used_bytes += weight;
        shard.entries.insert(
            key,
            Entry {
                value: value.clone(),
                weight,
                priority,
            },
        );
        value
    }

    /// Removes `key` if present, returning its value.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let idx = self.shard_index(key);
        let mut shard = self.shards[idx].lock();
        shard.entries.shift_remove(key).map(|e| {
            shard.used_bytes -= e.weight;
            e.value
        })
    }

    /// Total configured capacity across all shards, in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().capacity_bytes).sum()
    }

    /// Total resident bytes across all shards.
    #[must_use]
    pub fn memory_usage(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().used_bytes).sum()
    }

    /// Number of resident entries across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    /// Whether the cache currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resizes total capacity, redistributing evenly across shards.
    /// Shrinking triggers immediate eviction on the next insert into each
    /// over-budget shard rather than eagerly here.
    pub fn set_capacity(&self, capacity_bytes: u64) {
        let per_shard = capacity_bytes / self.shards.len() as u64;
        for shard in &self.shards {
            shard.lock().capacity_bytes = per_shard;
        }
    }

    /// Adjusts total capacity by `delta_bytes` (negative shrinks), refusing
    /// to move below `min_capacity_bytes`. Returns the capacity actually
    /// applied.
    pub fn adjust_capacity(&self, delta_bytes: i64, min_capacity_bytes: u64) -> u64 {
        let current = self.capacity() as i64;
        let target = (current + delta_bytes).max(min_capacity_bytes as i64) as u64;
        self.set_capacity(target);
        target
    }

    /// Total lookups (hits + misses) observed so far.
    #[must_use]
    pub fn lookup_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    /// Total successful lookups observed so far.
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Snapshot of hit/miss/eviction counters and current occupancy.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            memory_usage: self.memory_usage(),
            capacity: self.capacity(),
            len: self.len(),
        }
    }

    /// Per-shard JSON status snapshot: `{shards: [{capacity, usage, len}]}`
    /// plus the cache-wide hit/miss/eviction counters.
    #[must_use]
    pub fn status_json(&self) -> serde_json::Value {
        let shards: Vec<serde_json::Value> = self
            .shards
            .iter()
            .map(|s| {
                let shard = s.lock();
                serde_json::json!({
                    "capacity": shard.capacity_bytes,
                    "usage": shard.used_bytes,
                    "len": shard.entries.len(),
                })
            })
            .collect();
        serde_json::json!({
            "lookup_count": self.lookup_count(),
            "hit_count": self.hit_count(),
            "evictions": self.evictions.load(Ordering::Relaxed),
            "capacity": self.capacity(),
            "memory_usage": self.memory_usage(),
            "shards": shards,
        })
    }
}

#[cfg(test)]
#[path = "sharded_tests.rs"]
mod tests;
