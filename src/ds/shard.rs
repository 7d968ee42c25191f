//! Deterministic key-to-shard mapping.
//!
//! ## Architecture
//!
//! ```text
//!   Input Key
//!       │
//!       ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │  ShardSelector { shards: 4, seed, hash_builder: S }       │
//!   │                                                           │
//!   │  1. hasher = hash_builder.build_hasher()                  │
//!   │  2. seed.hash(&mut hasher)                                │
//!   │  3. key.hash(&mut hasher)                                 │
//!   │  4. hasher.finish() % 4                                   │
//!   └───────────────────────────────────────────────────────────┘
//!       │
//!       ▼
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! The seed is hashed ahead of the key so shard selection and the per-shard
//! index never hash a key identically; keys sharing a shard must not share
//! their in-shard bucket bits.
//!
//! The mapping depends only on `(key, seed, shards, hash_builder)`, so a key
//! stays on its shard for the lifetime of the selector. Keys are not
//! guaranteed to spread evenly; one shard can be full while others are empty.

use std::hash::{BuildHasher, Hash, Hasher};

use crate::store::traits::DefaultHashBuilder;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SHARD_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Maps any `Hash`able key to a shard index in `[0, shards)`.
///
/// # Example
///
/// ```
/// use shardcache::ds::ShardSelector;
///
/// let selector: ShardSelector = ShardSelector::new(8, 42);
///
/// let shard = selector.shard_for_key(&"my_key");
/// assert!(shard < 8);
/// assert_eq!(selector.shard_for_key(&"my_key"), shard);
/// ```
#[derive(Debug, Clone)]
pub struct ShardSelector<S = DefaultHashBuilder> {
    shards: usize,
    seed: u64,
    hash_builder: S,
}

impl<S: Default> ShardSelector<S> {
    /// Creates a selector for `shards` shards; zero is clamped to one.
    ///
    /// ```
    /// use shardcache::ds::ShardSelector;
    ///
    /// let single: ShardSelector = ShardSelector::new(0, 0);
    /// assert_eq!(single.shard_count(), 1);
    /// ```
    pub fn new(shards: usize, seed: u64) -> Self {
        Self::with_hasher(shards, seed, S::default())
    }
}

impl<S> ShardSelector<S> {
    /// Creates a selector hashing through `hash_builder`.
    pub fn with_hasher(shards: usize, seed: u64, hash_builder: S) -> Self {
        Self {
            shards: shards.max(1),
            seed,
            hash_builder,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl<S: BuildHasher> ShardSelector<S> {
    /// Maps a key to a shard index in `[0, shards)`.
    #[inline]
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = self.hash_builder.build_hasher();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() % self.shards as u64) as usize
    }
}

impl Default for ShardSelector {
    /// Single-shard selector with the default seed.
    fn default() -> Self {
        Self::new(1, DEFAULT_SHARD_SEED)
    }
}

/// Splits `total` capacity across `shards` shards.
///
/// Every shard gets `total / shards`; shard 0 additionally takes the
/// remainder.
///
/// ```
/// use shardcache::ds::shard::split_capacity;
///
/// assert_eq!(split_capacity(11, 4), vec![5, 2, 2, 2]);
/// assert_eq!(split_capacity(10, 2), vec![5, 5]);
/// ```
pub fn split_capacity(total: usize, shards: usize) -> Vec<usize> {
    let shards = shards.max(1);
    let base = total / shards;
    let remainder = total % shards;
    (0..shards)
        .map(|idx| if idx == 0 { base + remainder } else { base })
        .collect()
}

/// Number of shards actually built for a requested `(capacity, shards)` pair.
///
/// Never more shards than capacity units, never fewer than one.
pub fn effective_shard_count(capacity: usize, requested: usize) -> usize {
    requested.min(capacity).max(1)
}
