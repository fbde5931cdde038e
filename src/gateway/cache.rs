//! TTL response cache, bounded by entry count with least-recently-used eviction.
//!
//! Keys are spread over a few independently locked [`LruCache`] shards, so writers to
//! different keys rarely meet. Small caches get a single shard and evict in exact LRU
//! order. Entries are immutable once stored; a `set` replaces the whole entry.

use std::{
    borrow::Borrow,
    hash::{BuildHasher, Hash, RandomState},
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use lru::LruCache;
use tokio::time::Instant;

/// Entries each shard should hold before another shard is worth its lock.
const ENTRIES_PER_SHARD: usize = 64;
const MAX_SHARDS: usize = 16;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

pub struct ResponseCache<K, V> {
    shards: Box<[Mutex<LruCache<K, CacheEntry<V>>>]>,
    hasher: RandomState,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = (capacity / ENTRIES_PER_SHARD).clamp(1, MAX_SHARDS);
        let per_shard = NonZeroUsize::new(capacity / shard_count).unwrap_or(NonZeroUsize::MIN);

        Self {
            shards: (0..shard_count)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
            hasher: RandomState::new(),
        }
    }

    /// Returns the stored value unless it is missing or past its TTL.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut shard = self.shard(key);
        let expired = match shard.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            shard.pop(key);
        }
        None
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// A full shard drops its expired entries before it evicts a live one.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now + ttl,
        };

        let mut shard = self.shard(&key);
        if shard.len() == shard.cap().get() && !shard.contains(&key) {
            let expired: Vec<K> = shard
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                shard.pop(key);
            }
        }
        shard.put(key, entry);
    }

    /// Number of stored entries, expired ones included until they are read or purged.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard<Q>(&self, key: &Q) -> MutexGuard<'_, LruCache<K, CacheEntry<V>>>
    where
        Q: Hash + ?Sized,
    {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        // entries are replaced whole, so a poisoned shard is still consistent
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
