//! # Cache Contract
//!
//! [`RecencyCache`] is the operation set shared by every single-threaded
//! cache in this crate. The sharded wrapper is generic over it, so one
//! wrapper serves both eviction policies.
//!
//! ```text
//!                    ┌───────────────────────────────────────────┐
//!                    │              RecencyCache                 │
//!                    │                                           │
//!                    │  find(&mut, &K) → Option<&V>              │
//!                    │  contains(&mut, &K) → bool                │
//!                    │  insert(&mut, K, V) → bool                │
//!                    │  emplace / emplace_with / try_emplace_with│
//!                    │  update(&mut, K, V)                       │
//!                    │  remove(&mut, &K) → Option<V>             │
//!                    │  len / is_empty / capacity                │
//!                    │  clear / reserve                          │
//!                    └─────────────────────┬─────────────────────┘
//!                                          │
//!                    ┌─────────────────────┴─────────────────────┐
//!                    ▼                                           ▼
//!        ┌───────────────────────┐                   ┌───────────────────────┐
//!        │   LruCache<K, V, B>   │                   │   TtlCache<K, V, B>   │
//!        │                       │                   │  + max_age            │
//!        │  reset(capacity)      │                   │  reset(max_age, cap)  │
//!        └───────────────────────┘                   └───────────────────────┘
//! ```
//!
//! `find` and `contains` take `&mut self`: a hit is a use, and a use moves
//! the entry to the fresh end of the recency order.
//!
//! `reset` lives on the concrete types; its parameters differ per policy.

use std::convert::Infallible;
use std::hash::Hash;

use crate::error::InvariantError;

/// Operations every recency-ordered cache supports.
///
/// # Example
///
/// ```
/// use shardcache::traits::RecencyCache;
/// use shardcache::policy::lru::LruCache;
///
/// fn warm<C: RecencyCache<Key = u64, Value = String>>(cache: &mut C, data: &[(u64, &str)]) {
///     for (key, value) in data {
///         cache.emplace(*key, *value);
///     }
/// }
///
/// let mut cache: LruCache<u64, String> = LruCache::new(100);
/// warm(&mut cache, &[(1, "one"), (2, "two")]);
/// assert_eq!(cache.len(), 2);
/// ```
pub trait RecencyCache {
    type Key: Hash + Eq;
    type Value;

    /// Looks `key` up; a hit becomes the most recently used entry.
    fn find(&mut self, key: &Self::Key) -> Option<&Self::Value>;

    /// Presence check with the same side effects as [`find`](Self::find).
    fn contains(&mut self, key: &Self::Key) -> bool;

    /// Adds `(key, value)` unless `key` is cached. Returns whether an
    /// insertion took place; an existing entry is promoted instead.
    fn insert(&mut self, key: Self::Key, value: Self::Value) -> bool;

    /// Like [`insert`](Self::insert), but `make` runs only when a value is
    /// actually stored. Its error is returned untouched and leaves the cache
    /// unchanged.
    fn try_emplace_with<E, F>(&mut self, key: Self::Key, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<Self::Value, E>;

    fn emplace_with<F>(&mut self, key: Self::Key, make: F) -> bool
    where
        F: FnOnce() -> Self::Value,
    {
        match self.try_emplace_with(key, || Ok::<_, Infallible>(make())) {
            Ok(inserted) => inserted,
            Err(never) => match never {},
        }
    }

    fn emplace<T>(&mut self, key: Self::Key, value: T) -> bool
    where
        T: Into<Self::Value>,
    {
        self.emplace_with(key, || value.into())
    }

    /// Replaces the value for `key` (promoting it), or inserts it.
    fn update(&mut self, key: Self::Key, value: Self::Value);

    /// Removes `key`; a no-op returning `None` when absent.
    fn remove(&mut self, key: &Self::Key) -> Option<Self::Value>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn clear(&mut self);

    /// Changes capacity in place, evicting stale entries if it shrinks.
    fn reserve(&mut self, capacity: usize);

    fn check_invariants(&self) -> Result<(), InvariantError>;
}
