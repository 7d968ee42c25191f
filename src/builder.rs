//! Cache builder for every cache flavour in the crate.
//!
//! One builder carries the knobs; the `build_*` methods pick the flavour:
//!
//! | Method                  | Result                               |
//! |-------------------------|--------------------------------------|
//! | `build(policy)`         | [`Cache`], policy chosen at runtime  |
//! | `build_lru`             | [`LruCache`]                         |
//! | `build_ttl`             | [`TtlCache`]                         |
//! | `build_concurrent_lru`  | `ShardedCache<LruCache<K, V>, L>`    |
//! | `build_concurrent_ttl`  | `ShardedCache<TtlCache<K, V>, L>`    |
//!
//! The plain variants accept any configuration (a zero capacity yields a
//! cache that never stores anything). The `try_` variants reject zero
//! capacity, zero shards and a zero time-to-live with a [`ConfigError`].
//!
//! ## Example
//!
//! ```rust
//! use shardcache::builder::{CacheBuilder, CachePolicy};
//! use shardcache::traits::RecencyCache;
//! use std::time::Duration;
//!
//! let mut cache = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Lru);
//! cache.insert(1, "hello".to_string());
//! assert_eq!(cache.find(&1), Some(&"hello".to_string()));
//!
//! let sessions = CacheBuilder::new(1024)
//!     .time_to_live(Duration::from_secs(300))
//!     .try_build_ttl::<u64, String>()
//!     .unwrap();
//! assert_eq!(sessions.max_age(), Duration::from_secs(300));
//! ```

use std::hash::Hash;
use std::time::Duration;

use crate::error::{ConfigError, InvariantError};
use crate::policy::lru::LruCache;
use crate::policy::ttl::TtlCache;
use crate::traits::RecencyCache;

#[cfg(feature = "concurrency")]
use crate::ds::shard::DEFAULT_SHARD_SEED;
#[cfg(feature = "concurrency")]
use crate::lock::RawMutex;
#[cfg(feature = "concurrency")]
use crate::sharded::ShardedCache;
#[cfg(feature = "concurrency")]
use crate::store::traits::DefaultHashBuilder;

/// Shard count used when none is configured.
pub const DEFAULT_SHARDS: usize = 16;

/// Eviction policy picked at runtime by [`CacheBuilder::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Least Recently Used eviction.
    Lru,
    /// LRU eviction plus sliding expiration after `max_age`.
    Ttl { max_age: Duration },
}

/// Single-threaded cache whose policy was chosen at runtime.
pub struct Cache<K, V>
where
    K: Hash + Eq,
{
    inner: CacheInner<K, V>,
}

enum CacheInner<K, V>
where
    K: Hash + Eq,
{
    Lru(LruCache<K, V>),
    Ttl(TtlCache<K, V>),
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq,
{
    pub fn policy(&self) -> CachePolicy {
        match &self.inner {
            CacheInner::Lru(_) => CachePolicy::Lru,
            CacheInner::Ttl(ttl) => CachePolicy::Ttl {
                max_age: ttl.max_age(),
            },
        }
    }

    /// Drops every entry and re-sizes the cache; a TTL cache keeps its
    /// `max_age`.
    pub fn reset(&mut self, capacity: usize) {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.reset(capacity),
            CacheInner::Ttl(ttl) => {
                let max_age = ttl.max_age();
                ttl.reset(max_age, capacity)
            },
        }
    }
}

impl<K, V> RecencyCache for Cache<K, V>
where
    K: Hash + Eq,
{
    type Key = K;
    type Value = V;

    fn find(&mut self, key: &K) -> Option<&V> {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.find(key),
            CacheInner::Ttl(ttl) => ttl.find(key),
        }
    }

    fn contains(&mut self, key: &K) -> bool {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.contains(key),
            CacheInner::Ttl(ttl) => ttl.contains(key),
        }
    }

    fn insert(&mut self, key: K, value: V) -> bool {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.insert(key, value),
            CacheInner::Ttl(ttl) => ttl.insert(key, value),
        }
    }

    fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.try_emplace_with(key, make),
            CacheInner::Ttl(ttl) => ttl.try_emplace_with(key, make),
        }
    }

    fn update(&mut self, key: K, value: V) {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.update(key, value),
            CacheInner::Ttl(ttl) => ttl.update(key, value),
        }
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.remove(key),
            CacheInner::Ttl(ttl) => ttl.remove(key),
        }
    }

    fn len(&self) -> usize {
        match &self.inner {
            CacheInner::Lru(lru) => lru.len(),
            CacheInner::Ttl(ttl) => ttl.len(),
        }
    }

    fn capacity(&self) -> usize {
        match &self.inner {
            CacheInner::Lru(lru) => lru.capacity(),
            CacheInner::Ttl(ttl) => ttl.capacity(),
        }
    }

    fn clear(&mut self) {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.clear(),
            CacheInner::Ttl(ttl) => ttl.clear(),
        }
    }

    fn reserve(&mut self, capacity: usize) {
        match &mut self.inner {
            CacheInner::Lru(lru) => lru.reserve(capacity),
            CacheInner::Ttl(ttl) => ttl.reserve(capacity),
        }
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.check_invariants(),
            CacheInner::Ttl(ttl) => ttl.check_invariants(),
        }
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("policy", &self.policy())
            .field("len", &RecencyCache::len(self))
            .field("capacity", &RecencyCache::capacity(self))
            .finish()
    }
}

/// Builder for creating cache instances.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    capacity: usize,
    shards: usize,
    time_to_live: Option<Duration>,
    seed: Option<u64>,
}

impl CacheBuilder {
    /// Create a new cache builder with the specified total capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            shards: DEFAULT_SHARDS,
            time_to_live: None,
            seed: None,
        }
    }

    /// Requested shard count for the concurrent caches. The effective count
    /// never exceeds the capacity.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// How long an entry may go untouched before it expires. Without one,
    /// TTL caches never expire entries.
    pub fn time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = Some(time_to_live);
        self
    }

    /// Seed mixed into shard selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn max_age(&self) -> Duration {
        self.time_to_live.unwrap_or(Duration::MAX)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.time_to_live == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeToLive);
        }
        Ok(())
    }

    /// Build a cache with the specified policy.
    ///
    /// ```rust
    /// use shardcache::builder::{CacheBuilder, CachePolicy};
    /// use std::time::Duration;
    ///
    /// let lru = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Lru);
    /// let ttl = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Ttl {
    ///     max_age: Duration::from_secs(30),
    /// });
    /// assert_eq!(lru.policy(), CachePolicy::Lru);
    /// assert_eq!(ttl.policy(), CachePolicy::Ttl { max_age: Duration::from_secs(30) });
    /// ```
    pub fn build<K, V>(self, policy: CachePolicy) -> Cache<K, V>
    where
        K: Hash + Eq,
    {
        let inner = match policy {
            CachePolicy::Lru => CacheInner::Lru(LruCache::new(self.capacity)),
            CachePolicy::Ttl { max_age } => CacheInner::Ttl(TtlCache::new(max_age, self.capacity)),
        };
        Cache { inner }
    }

    pub fn build_lru<K, V>(self) -> LruCache<K, V>
    where
        K: Hash + Eq,
    {
        LruCache::new(self.capacity)
    }

    pub fn try_build_lru<K, V>(self) -> Result<LruCache<K, V>, ConfigError>
    where
        K: Hash + Eq,
    {
        self.validate()?;
        Ok(self.build_lru())
    }

    pub fn build_ttl<K, V>(self) -> TtlCache<K, V>
    where
        K: Hash + Eq,
    {
        TtlCache::new(self.max_age(), self.capacity)
    }

    pub fn try_build_ttl<K, V>(self) -> Result<TtlCache<K, V>, ConfigError>
    where
        K: Hash + Eq,
    {
        self.validate()?;
        Ok(self.build_ttl())
    }
}

#[cfg(feature = "concurrency")]
impl CacheBuilder {
    fn validate_sharded(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.shards == 0 {
            return Err(ConfigError::ZeroShards);
        }
        Ok(())
    }

    /// Sharded LRU cache guarded by lock type `L`.
    ///
    /// ```rust
    /// use shardcache::builder::CacheBuilder;
    /// use shardcache::lock::OsMutex;
    ///
    /// let cache = CacheBuilder::new(1000)
    ///     .shards(8)
    ///     .build_concurrent_lru::<u64, String, OsMutex>();
    /// assert_eq!(cache.shard_count(), 8);
    /// ```
    pub fn build_concurrent_lru<K, V, L>(self) -> ShardedCache<LruCache<K, V>, L>
    where
        K: Hash + Eq,
        L: RawMutex,
    {
        ShardedCache::<LruCache<K, V>, L>::with_seed_and_hasher(
            self.capacity,
            self.shards,
            self.seed.unwrap_or(DEFAULT_SHARD_SEED),
            DefaultHashBuilder::default(),
        )
    }

    pub fn try_build_concurrent_lru<K, V, L>(
        self,
    ) -> Result<ShardedCache<LruCache<K, V>, L>, ConfigError>
    where
        K: Hash + Eq,
        L: RawMutex,
    {
        self.validate_sharded()?;
        Ok(self.build_concurrent_lru())
    }

    /// Sharded TTL cache guarded by lock type `L`.
    pub fn build_concurrent_ttl<K, V, L>(self) -> ShardedCache<TtlCache<K, V>, L>
    where
        K: Hash + Eq,
        L: RawMutex,
    {
        ShardedCache::<TtlCache<K, V>, L>::with_seed_and_hasher(
            self.max_age(),
            self.capacity,
            self.shards,
            self.seed.unwrap_or(DEFAULT_SHARD_SEED),
            DefaultHashBuilder::default(),
        )
    }

    pub fn try_build_concurrent_ttl<K, V, L>(
        self,
    ) -> Result<ShardedCache<TtlCache<K, V>, L>, ConfigError>
    where
        K: Hash + Eq,
        L: RawMutex,
    {
        self.validate_sharded()?;
        Ok(self.build_concurrent_ttl())
    }
}
