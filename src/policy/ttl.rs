//! # Time-To-Live (TTL) Cache
//!
//! An [`LruCache`] whose entries also expire once they have gone untouched
//! for longer than a per-cache `max_age`.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                   TtlCache<K, V, B>                              │
//!   │                                                                  │
//!   │   max_age: Duration                                              │
//!   │                                                                  │
//!   │   ┌──────────────────────────────────────────────────────────┐   │
//!   │   │  LruCache<K, Expiring<V>, B>                             │   │
//!   │   │                                                          │   │
//!   │   │   head ──► [A, t=12] ◄──► [B, t=7] ◄──► [C, t=3] ◄── tail│   │
//!   │   │   (fresh)                               (stale)          │   │
//!   │   └──────────────────────────────────────────────────────────┘   │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Expiration Rules
//!
//! - An entry is expired when `now - touched > max_age`.
//! - Expiration is discovered lazily, only for the key an operation touches.
//!   There is no background sweep; `len()` counts expired entries nobody
//!   has looked at yet.
//! - Every successful touch refreshes `touched` (sliding expiration).
//! - Capacity eviction ignores age: a full cache drops its stale end.
//!
//! | Operation          | Fresh entry               | Expired entry                    | Absent   |
//! |--------------------|---------------------------|----------------------------------|----------|
//! | `find`/`contains`  | promote + refresh, hit    | removed, miss                    | miss     |
//! | `insert`/`emplace` | promote + refresh, `false`| overwrite + refresh, `true`      | admit    |
//! | `update`           | overwrite + refresh       | overwrite + refresh              | admit    |
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::policy::ttl::TtlCache;
//! use std::time::Duration;
//!
//! let mut sessions: TtlCache<u64, String> = TtlCache::new(Duration::from_secs(300), 1024);
//! sessions.insert(7, "alice".to_string());
//!
//! assert_eq!(sessions.find(&7).map(String::as_str), Some("alice"));
//! assert_eq!(sessions.max_age(), Duration::from_secs(300));
//! ```

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::InvariantError;
use crate::policy::lru::LruCache;
use crate::store::node::NodeStore;
use crate::store::traits::{DefaultHashBuilder, RecencyStore};
use crate::traits::RecencyCache;

/// Cached value plus the instant it was last touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiring<V> {
    value: V,
    touched: Instant,
}

impl<V> Expiring<V> {
    fn new(value: V, touched: Instant) -> Self {
        Self { value, touched }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn touched(&self) -> Instant {
        self.touched
    }

    #[inline]
    fn is_expired(&self, max_age: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.touched) > max_age
    }
}

/// LRU cache with sliding per-entry expiration.
pub struct TtlCache<K, V, B = NodeStore<K, Expiring<V>>> {
    inner: LruCache<K, Expiring<V>, B>,
    max_age: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty cache of `capacity` entries that expire after
    /// `max_age` without a touch.
    pub fn new(max_age: Duration, capacity: usize) -> Self {
        Self::with_hasher(max_age, capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, B> TtlCache<K, V, B>
where
    B: RecencyStore<K, Expiring<V>>,
{
    pub fn with_hasher(max_age: Duration, capacity: usize, hash_builder: B::BuildHasher) -> Self {
        Self {
            inner: LruCache::with_hasher(capacity, hash_builder),
            max_age,
        }
    }

    #[inline]
    fn expired(&self, key: &K, now: Instant) -> Option<bool> {
        self.inner
            .peek(key)
            .map(|entry| entry.is_expired(self.max_age, now))
    }

    fn expire(&mut self, key: &K) {
        if self.inner.remove(key).is_some() {
            trace!(max_age = ?self.max_age, "dropped expired entry");
        }
    }

    /// Promotes `key`, refreshes its timestamp and hands back the entry.
    #[inline]
    fn touch(&mut self, key: &K, now: Instant) -> Option<&mut Expiring<V>> {
        let entry = self.inner.find_mut(key)?;
        entry.touched = now;
        Some(entry)
    }

    /// Overwrites a present entry with a fresh value and promotes it.
    fn overwrite(&mut self, key: &K, value: V, now: Instant) {
        if let Some(entry) = self.inner.find_mut(key) {
            *entry = Expiring::new(value, now);
        }
    }

    /// Looks `key` up; a fresh hit is promoted and its age reset.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn find(&mut self, key: &K) -> Option<&V> {
        self.find_mut(key).map(|value| &*value)
    }

    /// Like [`find`](Self::find), with mutable access to the value.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let now = Instant::now();
        if self.expired(key, now)? {
            self.expire(key);
            return None;
        }
        self.touch(key, now).map(|entry| &mut entry.value)
    }

    /// Reports presence with the same side effects as [`find`](Self::find).
    pub fn contains(&mut self, key: &K) -> bool {
        self.find_mut(key).is_some()
    }

    /// Looks `key` up without promoting, refreshing or removing anything.
    ///
    /// Expired entries read as absent.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let entry = self.inner.peek(key)?;
        (!entry.is_expired(self.max_age, Instant::now())).then_some(&entry.value)
    }

    /// Inserts `value` unless a fresh entry for `key` exists.
    ///
    /// A fresh entry is promoted and refreshed, and `false` is returned. An
    /// expired entry is overwritten in place and counts as an insertion.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let now = Instant::now();
        match self.expired(&key, now) {
            Some(false) => {
                self.touch(&key, now);
                false
            },
            Some(true) => {
                self.overwrite(&key, value, now);
                true
            },
            None => self.inner.admit(key, Expiring::new(value, now)),
        }
    }

    pub fn emplace<T: Into<V>>(&mut self, key: K, value: T) -> bool {
        self.emplace_with(key, || value.into())
    }

    pub fn emplace_with<F>(&mut self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        match self.try_emplace_with(key, || Ok::<V, std::convert::Infallible>(make())) {
            Ok(inserted) => inserted,
            Err(never) => match never {},
        }
    }

    /// Fallible emplace; `make` runs only when a value will be stored.
    pub fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = Instant::now();
        match self.expired(&key, now) {
            Some(false) => {
                self.touch(&key, now);
                Ok(false)
            },
            Some(true) => {
                let value = make()?;
                self.overwrite(&key, value, now);
                Ok(true)
            },
            None if self.inner.capacity() == 0 => Ok(false),
            None => {
                let value = make()?;
                Ok(self.inner.admit(key, Expiring::new(value, now)))
            },
        }
    }

    /// Stores `value` under `key`, replacing any entry, expired or not.
    pub fn update(&mut self, key: K, value: V) {
        let now = Instant::now();
        if self.inner.peek(&key).is_some() {
            self.overwrite(&key, value, now);
        } else {
            self.inner.admit(key, Expiring::new(value, now));
        }
    }

    /// Removes `key`. An entry that had already expired is dropped and
    /// reported as absent.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let max_age = self.max_age;
        self.inner
            .remove(key)
            .filter(|entry| !entry.is_expired(max_age, now))
            .map(|entry| entry.value)
    }

    /// Entry count, including expired entries not yet discovered.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    #[inline]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// See [`LruCache::reserve`].
    pub fn reserve(&mut self, capacity: usize) {
        self.inner.reserve(capacity);
    }

    /// Drops every entry and applies a new `max_age` and capacity.
    pub fn reset(&mut self, max_age: Duration, capacity: usize) {
        self.max_age = max_age;
        self.inner.reset(capacity);
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.check_invariants()
    }
}

impl<K, V, B> RecencyCache for TtlCache<K, V, B>
where
    K: Hash + Eq,
    B: RecencyStore<K, Expiring<V>>,
{
    type Key = K;
    type Value = V;

    fn find(&mut self, key: &K) -> Option<&V> {
        TtlCache::find(self, key)
    }

    fn contains(&mut self, key: &K) -> bool {
        TtlCache::contains(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> bool {
        TtlCache::insert(self, key, value)
    }

    fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        TtlCache::try_emplace_with(self, key, make)
    }

    fn update(&mut self, key: K, value: V) {
        TtlCache::update(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        TtlCache::remove(self, key)
    }

    fn len(&self) -> usize {
        TtlCache::len(self)
    }

    fn capacity(&self) -> usize {
        TtlCache::capacity(self)
    }

    fn clear(&mut self) {
        TtlCache::clear(self)
    }

    fn reserve(&mut self, capacity: usize) {
        TtlCache::reserve(self, capacity)
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        TtlCache::check_invariants(self)
    }
}

impl<K, V, B> fmt::Debug for TtlCache<K, V, B>
where
    B: RecencyStore<K, Expiring<V>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.inner.len())
            .field("capacity", &self.inner.capacity())
            .field("max_age", &self.max_age)
            .finish()
    }
}
