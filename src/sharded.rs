//! # Sharded Concurrent Caches
//!
//! Thread-safe caches built from independently locked single-threaded shards.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                   ShardedCache<C, L, S>                              │
//!   │                                                                      │
//!   │   selector: ShardSelector<S>    (seeded hash % shard count)          │
//!   │                                                                      │
//!   │   ┌─────────────────┐ ┌─────────────────┐       ┌─────────────────┐  │
//!   │   │ Shard 0 (64B al)│ │ Shard 1         │  ...  │ Shard n-1       │  │
//!   │   │ Mutex<L, C>     │ │ Mutex<L, C>     │       │ Mutex<L, C>     │  │
//!   │   │ cap = base+rem  │ │ cap = base      │       │ cap = base      │  │
//!   │   └─────────────────┘ └─────────────────┘       └─────────────────┘  │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Shard count is `min(capacity, requested)`, at least one, and never
//!   changes after construction.
//! - Every shard holds `capacity / count` entries; shard 0 also takes the
//!   remainder. `reserve` and `reset` split the new capacity the same way.
//! - A key always maps to the same shard. Eviction happens per shard: one
//!   shard can evict while others still have room.
//! - Single-key operations lock exactly one shard. Aggregates (`len`,
//!   `clear`, `reserve`, `reset`, `check_invariants`) lock shards one at a
//!   time, so their results are snapshots, not atomic views.
//! - `emplace_with` and `try_emplace_with` build the value while holding
//!   the shard lock.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::sharded::ConcurrentLruCache;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let cache: Arc<ConcurrentLruCache<u64, String>> = Arc::new(ConcurrentLruCache::new(1024, 8));
//!
//! let handles: Vec<_> = (0..4u64)
//!     .map(|t| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || {
//!             for k in (t * 100)..(t * 100 + 100) {
//!                 cache.insert(k, k.to_string());
//!             }
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(cache.len(), 400);
//! assert_eq!(cache.find(&42).as_deref(), Some("42"));
//! ```

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::lock_api::{Mutex, MutexGuard};
use tracing::debug;

use crate::ds::shard::{effective_shard_count, split_capacity, ShardSelector, DEFAULT_SHARD_SEED};
use crate::error::InvariantError;
use crate::lock::{RawMutex, SpinLock};
use crate::policy::lru::LruCache;
use crate::policy::ttl::{Expiring, TtlCache};
use crate::store::traits::{DefaultHashBuilder, RecencyStore};
use crate::traits::RecencyCache;

/// One lock-guarded cache, padded to its own cache line.
#[repr(align(64))]
struct Shard<L, C> {
    cache: Mutex<L, C>,
}

/// Fixed set of independently locked caches addressed by key hash.
pub struct ShardedCache<C, L = SpinLock, S = DefaultHashBuilder> {
    shards: Box<[Shard<L, C>]>,
    selector: ShardSelector<S>,
    capacity: AtomicUsize,
}

/// Sharded LRU cache.
pub type ConcurrentLruCache<K, V, L = SpinLock> = ShardedCache<LruCache<K, V>, L>;

/// Sharded TTL cache.
pub type ConcurrentTtlCache<K, V, L = SpinLock> = ShardedCache<TtlCache<K, V>, L>;

impl<C, L, S> ShardedCache<C, L, S>
where
    L: RawMutex,
    S: BuildHasher + Clone,
{
    fn build<F>(capacity: usize, shards: usize, seed: u64, hash_builder: S, mut make: F) -> Self
    where
        F: FnMut(usize, S) -> C,
    {
        let count = effective_shard_count(capacity, shards);
        let shards: Box<[Shard<L, C>]> = split_capacity(capacity, count)
            .into_iter()
            .map(|shard_capacity| Shard {
                cache: Mutex::new(make(shard_capacity, hash_builder.clone())),
            })
            .collect();
        debug!(capacity, shards = shards.len(), seed, "built sharded cache");
        Self {
            shards,
            selector: ShardSelector::with_hasher(count, seed, hash_builder),
            capacity: AtomicUsize::new(capacity),
        }
    }
}

impl<C, L, S> ShardedCache<C, L, S>
where
    C: RecencyCache,
    L: RawMutex,
    S: BuildHasher,
{
    /// Shard index `key` maps to.
    #[inline]
    pub fn shard_for_key(&self, key: &C::Key) -> usize {
        self.selector.shard_for_key(key)
    }

    #[inline]
    fn lock_shard(&self, key: &C::Key) -> MutexGuard<'_, L, C> {
        self.shards[self.shard_for_key(key)].cache.lock()
    }

    /// Looks `key` up, promoting it within its shard, and clones the value.
    pub fn find(&self, key: &C::Key) -> Option<C::Value>
    where
        C::Value: Clone,
    {
        self.find_with(key, Clone::clone)
    }

    /// Looks `key` up and maps the value under the shard lock.
    ///
    /// ```
    /// use shardcache::sharded::ConcurrentLruCache;
    ///
    /// let cache: ConcurrentLruCache<u32, Vec<u8>> = ConcurrentLruCache::new(16, 4);
    /// cache.insert(1, vec![0; 4096]);
    /// assert_eq!(cache.find_with(&1, |bytes| bytes.len()), Some(4096));
    /// ```
    pub fn find_with<R>(&self, key: &C::Key, f: impl FnOnce(&C::Value) -> R) -> Option<R> {
        self.lock_shard(key).find(key).map(f)
    }

    pub fn contains(&self, key: &C::Key) -> bool {
        self.lock_shard(key).contains(key)
    }

    pub fn insert(&self, key: C::Key, value: C::Value) -> bool {
        self.lock_shard(&key).insert(key, value)
    }

    pub fn emplace<T: Into<C::Value>>(&self, key: C::Key, value: T) -> bool {
        self.lock_shard(&key).emplace(key, value)
    }

    pub fn emplace_with<F>(&self, key: C::Key, make: F) -> bool
    where
        F: FnOnce() -> C::Value,
    {
        self.lock_shard(&key).emplace_with(key, make)
    }

    pub fn try_emplace_with<E, F>(&self, key: C::Key, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<C::Value, E>,
    {
        self.lock_shard(&key).try_emplace_with(key, make)
    }

    pub fn update(&self, key: C::Key, value: C::Value) {
        self.lock_shard(&key).update(key, value)
    }

    pub fn remove(&self, key: &C::Key) -> Option<C::Value> {
        self.lock_shard(key).remove(key)
    }

    /// Sum of shard lengths, read one shard at a time.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.cache.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.cache.lock().is_empty())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Current capacity of every shard, in shard order.
    pub fn shard_capacities(&self) -> Vec<usize> {
        self.shards
            .iter()
            .map(|shard| shard.cache.lock().capacity())
            .collect()
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.cache.lock().clear();
        }
    }

    /// Re-splits `capacity` across the shards without clearing them.
    ///
    /// A shard whose new share is below its length evicts its stale end.
    pub fn reserve(&self, capacity: usize) {
        let parts = split_capacity(capacity, self.shards.len());
        for (shard, part) in self.shards.iter().zip(parts) {
            shard.cache.lock().reserve(part);
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        debug!(capacity, shards = self.shards.len(), "reserved sharded cache");
    }

    /// Checks every shard, one lock at a time.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (idx, shard) in self.shards.iter().enumerate() {
            shard
                .cache
                .lock()
                .check_invariants()
                .map_err(|err| InvariantError::new(format!("shard {idx}: {err}")))?;
        }
        Ok(())
    }
}

impl<K, V, L> ShardedCache<LruCache<K, V>, L>
where
    K: Hash + Eq,
    L: RawMutex,
{
    /// Creates an LRU cache of `capacity` entries spread over up to
    /// `shards` shards.
    pub fn new(capacity: usize, shards: usize) -> Self {
        Self::with_hasher(capacity, shards, DefaultHashBuilder::default())
    }
}

impl<K, V, B, L, S> ShardedCache<LruCache<K, V, B>, L, S>
where
    K: Hash + Eq,
    B: RecencyStore<K, V, BuildHasher = S>,
    L: RawMutex,
    S: BuildHasher + Clone,
{
    /// Creates a sharded LRU cache hashing with `hash_builder`, both for
    /// shard selection and inside each shard.
    pub fn with_hasher(capacity: usize, shards: usize, hash_builder: S) -> Self {
        Self::with_seed_and_hasher(capacity, shards, DEFAULT_SHARD_SEED, hash_builder)
    }

    /// Like [`with_hasher`](Self::with_hasher) with an explicit shard
    /// selection seed.
    pub fn with_seed_and_hasher(capacity: usize, shards: usize, seed: u64, hash_builder: S) -> Self {
        Self::build(capacity, shards, seed, hash_builder, LruCache::<K, V, B>::with_hasher)
    }

    /// Clears every shard and re-splits `capacity` across them.
    pub fn reset(&self, capacity: usize) {
        let parts = split_capacity(capacity, self.shards.len());
        for (shard, part) in self.shards.iter().zip(parts) {
            shard.cache.lock().reset(part);
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        debug!(capacity, shards = self.shards.len(), "reset sharded cache");
    }
}

impl<K, V, L> ShardedCache<TtlCache<K, V>, L>
where
    K: Hash + Eq,
    L: RawMutex,
{
    /// Creates a TTL cache of `capacity` entries spread over up to `shards`
    /// shards, each entry expiring after `max_age` without a touch.
    pub fn new(max_age: Duration, capacity: usize, shards: usize) -> Self {
        Self::with_hasher(max_age, capacity, shards, DefaultHashBuilder::default())
    }
}

impl<K, V, B, L, S> ShardedCache<TtlCache<K, V, B>, L, S>
where
    K: Hash + Eq,
    B: RecencyStore<K, Expiring<V>, BuildHasher = S>,
    L: RawMutex,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(max_age: Duration, capacity: usize, shards: usize, hash_builder: S) -> Self {
        Self::with_seed_and_hasher(max_age, capacity, shards, DEFAULT_SHARD_SEED, hash_builder)
    }

    pub fn with_seed_and_hasher(
        max_age: Duration,
        capacity: usize,
        shards: usize,
        seed: u64,
        hash_builder: S,
    ) -> Self {
        Self::build(capacity, shards, seed, hash_builder, |shard_capacity, hasher| {
            TtlCache::with_hasher(max_age, shard_capacity, hasher)
        })
    }

    pub fn max_age(&self) -> Duration {
        self.shards[0].cache.lock().max_age()
    }

    /// Clears every shard and applies the new `max_age` and capacity.
    pub fn reset(&self, max_age: Duration, capacity: usize) {
        let parts = split_capacity(capacity, self.shards.len());
        for (shard, part) in self.shards.iter().zip(parts) {
            shard.cache.lock().reset(max_age, part);
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        debug!(capacity, ?max_age, shards = self.shards.len(), "reset sharded cache");
    }
}

impl<C, L, S> fmt::Debug for ShardedCache<C, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .field("seed", &self.selector.seed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::OsMutex;
    use std::mem;

    #[test]
    fn shards_are_cache_line_aligned() {
        assert_eq!(mem::align_of::<Shard<SpinLock, LruCache<u64, u64>>>(), 64);
    }

    #[test]
    fn capacity_is_split_with_remainder_on_first_shard() {
        let cache: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(11, 4);
        assert_eq!(cache.shard_count(), 4);
        assert_eq!(cache.shard_capacities(), vec![5, 2, 2, 2]);
        assert_eq!(cache.capacity(), 11);
    }

    #[test]
    fn shard_count_never_exceeds_capacity() {
        let cache: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(3, 8);
        assert_eq!(cache.shard_count(), 3);
        assert_eq!(cache.shard_capacities(), vec![1, 1, 1]);

        let empty: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(0, 8);
        assert_eq!(empty.shard_count(), 1);
        assert!(!empty.insert(1, 1));
        assert!(empty.is_empty());
    }

    #[test]
    fn emplace_evicts_then_reset_clears() {
        let cache: ConcurrentLruCache<u32, String> = ConcurrentLruCache::new(2, 1);
        assert!(cache.emplace(0, "aaaa"));
        assert!(cache.emplace(1, "bbbb"));
        assert!(cache.emplace(2, "cccc"));
        assert!(!cache.contains(&0));
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert_eq!(cache.len(), 2);

        cache.reset(4);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.capacity(), 4);
        assert!(cache.emplace(0, "aaaa"));
        assert!(cache.contains(&0));
        assert!(!cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn operations_route_to_the_key_shard() {
        let cache: ConcurrentLruCache<u64, u64, OsMutex> = ConcurrentLruCache::new(64, 4);
        for k in 0..32 {
            assert!(cache.insert(k, k * 10));
        }
        for k in 0..32 {
            let shard = cache.shard_for_key(&k);
            assert_eq!(cache.shard_for_key(&k), shard);
            assert_eq!(cache.find(&k), Some(k * 10));
        }
        cache.update(5, 55);
        assert_eq!(cache.find(&5), Some(55));
        assert_eq!(cache.remove(&5), Some(55));
        assert!(!cache.contains(&5));
        assert_eq!(cache.len(), 31);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn reserve_resplits_without_clearing() {
        let cache: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(8, 2);
        cache.insert(1, 1);
        cache.reserve(21);
        assert_eq!(cache.capacity(), 21);
        assert_eq!(cache.shard_capacities(), vec![11, 10]);
        assert!(cache.contains(&1));
    }

    #[test]
    fn failed_emplace_releases_lock_and_keeps_state() {
        let cache: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(4, 1);
        cache.insert(1, 1);
        let result: Result<bool, &str> = cache.try_emplace_with(2, || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(cache.insert(2, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_all_shards() {
        let cache: ConcurrentLruCache<u32, u32> = ConcurrentLruCache::new(32, 4);
        for k in 0..32 {
            cache.insert(k, k);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 32);
    }

    #[test]
    fn ttl_variant_reconfigures_on_reset() {
        let cache: ConcurrentTtlCache<u32, String> =
            ConcurrentTtlCache::new(Duration::from_secs(30), 10, 3);
        assert_eq!(cache.shard_capacities(), vec![4, 3, 3]);
        assert!(cache.insert(1, "one".into()));
        assert_eq!(cache.find(&1).as_deref(), Some("one"));

        cache.reset(Duration::from_secs(90), 6);
        assert!(cache.is_empty());
        assert_eq!(cache.max_age(), Duration::from_secs(90));
        assert_eq!(cache.shard_capacities(), vec![2, 2, 2]);
    }
}
