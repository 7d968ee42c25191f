//! # Least Recently Used (LRU) Cache
//!
//! Single-threaded, fixed-capacity cache that evicts the entry touched
//! longest ago. Every point operation is O(1).
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                    LruCache<K, V, B>                             │
//!   │                                                                  │
//!   │   capacity: usize                                                │
//!   │                                                                  │
//!   │   ┌──────────────────────────────────────────────────────────┐   │
//!   │   │  B: RecencyStore<K, V>                                   │   │
//!   │   │                                                          │   │
//!   │   │   index ──► slot                                         │   │
//!   │   │                                                          │   │
//!   │   │   head ──► [A] ◄──► [B] ◄──► [C] ◄── tail                │   │
//!   │   │   (fresh)                    (stale)                     │   │
//!   │   └──────────────────────────────────────────────────────────┘   │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy only decides *when* to promote, admit and evict. The store
//! decides how entries are located and linked; see [`crate::store`].
//!
//! ## Operations
//!
//! ```text
//!   INSERT new key (cache full, capacity = 3)
//!
//!     head ──► [A] ◄──► [B] ◄──► [C] ◄── tail
//!
//!   insert(D):  C's slot is overwritten with D and spliced to the head
//!
//!     head ──► [D] ◄──► [A] ◄──► [B] ◄── tail
//!
//!   FIND / CONTAINS existing key
//!
//!   find(B):
//!     head ──► [B] ◄──► [D] ◄──► [A] ◄── tail
//!
//!   INSERT existing key: promotes, keeps the old value, returns false
//!   UPDATE existing key: promotes and replaces the value
//! ```
//!
//! | Operation          | Present key             | Absent key                         |
//! |--------------------|-------------------------|------------------------------------|
//! | `find`/`contains`  | promote, hit            | miss, no effect                    |
//! | `insert`/`emplace` | promote, `false`        | admit (evict if full), `true`      |
//! | `update`           | promote, replace value  | admit (evict if full)              |
//! | `remove`           | unlink, `Some(v)`       | `None`                             |
//! | `peek`             | hit, order unchanged    | miss                               |
//!
//! A cache of capacity zero is valid and never holds anything.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::policy::lru::LruCache;
//!
//! let mut cache: LruCache<u32, String> = LruCache::new(2);
//! cache.emplace(0, "aaaa");
//! cache.emplace(1, "bbbb");
//! cache.emplace(2, "cccc");
//!
//! assert!(!cache.contains(&0));
//! assert!(cache.contains(&1));
//! assert!(cache.contains(&2));
//! assert_eq!(cache.len(), 2);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use tracing::trace;

use crate::error::InvariantError;
use crate::store::node::NodeStore;
use crate::store::traits::{DefaultHashBuilder, RecencyStore};
use crate::traits::RecencyCache;

/// Fixed-capacity LRU cache over a pluggable storage strategy.
///
/// `B` defaults to [`NodeStore`]; any [`RecencyStore`] can be used instead
/// without changing observable behaviour.
pub struct LruCache<K, V, B = NodeStore<K, V>> {
    store: B,
    capacity: usize,
    _entries: PhantomData<(K, V)>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// ```
    /// use shardcache::policy::lru::LruCache;
    ///
    /// let cache: LruCache<u32, String> = LruCache::new(100);
    /// assert_eq!(cache.capacity(), 100);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, B> LruCache<K, V, B>
where
    B: RecencyStore<K, V>,
{
    /// Creates an empty cache whose index hashes with `hash_builder`.
    ///
    /// ```
    /// use shardcache::policy::lru::LruCache;
    /// use shardcache::store::LinkedMapStore;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let mut cache: LruCache<&str, u32, LinkedMapStore<&str, u32, RandomState>> =
    ///     LruCache::with_hasher(8, RandomState::new());
    /// assert!(cache.insert("a", 1));
    /// assert_eq!(cache.find(&"a"), Some(&1));
    /// ```
    pub fn with_hasher(capacity: usize, hash_builder: B::BuildHasher) -> Self {
        Self {
            store: B::with_capacity_and_hasher(capacity, hash_builder),
            capacity,
            _entries: PhantomData,
        }
    }

    /// Looks `key` up and marks it most recently used.
    #[inline]
    pub fn find(&mut self, key: &K) -> Option<&V> {
        self.store.promote(key).map(|value| &*value)
    }

    /// Like [`find`](Self::find), with mutable access to the value.
    #[inline]
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        self.store.promote(key)
    }

    /// Reports presence; a hit promotes exactly like [`find`](Self::find).
    #[inline]
    pub fn contains(&mut self, key: &K) -> bool {
        self.store.promote(key).is_some()
    }

    /// Looks `key` up without touching recency order.
    #[inline]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.store.get(key)
    }

    /// Inserts `value` under `key` unless the key is already cached.
    ///
    /// Returns `true` if the entry was added. An existing entry is promoted
    /// and keeps its value. When the cache is full the least recently used
    /// entry is evicted first.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.store.promote(&key).is_some() {
            return false;
        }
        self.admit(key, value)
    }

    /// [`insert`](Self::insert) with the value converted only on admission.
    pub fn emplace<T: Into<V>>(&mut self, key: K, value: T) -> bool {
        self.emplace_with(key, || value.into())
    }

    /// [`insert`](Self::insert) with the value built only on admission.
    pub fn emplace_with<F>(&mut self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        match self.try_emplace_with(key, || Ok::<V, Infallible>(make())) {
            Ok(inserted) => inserted,
            Err(never) => match never {},
        }
    }

    /// Fallible [`emplace_with`](Self::emplace_with).
    ///
    /// `make` runs before anything is evicted, so an `Err` leaves the cache
    /// exactly as it was and is handed back unchanged.
    ///
    /// ```
    /// use shardcache::policy::lru::LruCache;
    ///
    /// let mut cache: LruCache<u32, u32> = LruCache::new(1);
    /// cache.insert(1, 10);
    ///
    /// let failed: Result<bool, &str> = cache.try_emplace_with(2, || Err("backend down"));
    /// assert_eq!(failed, Err("backend down"));
    /// assert_eq!(cache.peek(&1), Some(&10));
    /// ```
    pub fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if self.store.promote(&key).is_some() || self.capacity == 0 {
            return Ok(false);
        }
        let value = make()?;
        Ok(self.admit(key, value))
    }

    /// Replaces the value of a cached key (promoting it), or inserts it.
    pub fn update(&mut self, key: K, value: V) {
        match self.store.promote(&key) {
            Some(slot) => *slot = value,
            None => {
                self.admit(key, value);
            },
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.store.remove(key).map(|(_, value)| value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_stale(&mut self) -> Option<(K, V)> {
        self.store.pop_stale()
    }

    /// Least recently used entry, without touching recency order.
    pub fn peek_stale(&self) -> Option<(&K, &V)> {
        self.store.peek_stale()
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> B::Iter<'_> {
        self.store.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hasher(&self) -> &B::BuildHasher {
        self.store.hasher()
    }

    /// Drops every entry; capacity is unchanged.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Sets a new capacity without clearing.
    ///
    /// Growing pre-sizes the index. Shrinking below the current length
    /// evicts least recently used entries until the cache fits.
    ///
    /// ```
    /// use shardcache::policy::lru::LruCache;
    ///
    /// let mut cache = LruCache::new(3);
    /// for k in 0..3 {
    ///     cache.insert(k, k);
    /// }
    /// cache.reserve(1);
    /// assert_eq!(cache.len(), 1);
    /// assert!(cache.contains(&2));
    /// ```
    pub fn reserve(&mut self, capacity: usize) {
        while self.store.len() > capacity {
            if self.store.pop_stale().is_none() {
                break;
            }
        }
        self.capacity = capacity;
        self.store.reserve(capacity);
    }

    /// Drops every entry and re-sizes the cache for `capacity` entries.
    pub fn reset(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.store.reset(capacity);
    }

    /// Verifies the capacity bound and the index/list bijection.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.store.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "cache holds {} entries over a capacity of {}",
                self.store.len(),
                self.capacity
            )));
        }
        self.store.check_invariants()
    }

    /// Stores an absent key at the fresh end, evicting the stale end when
    /// full. Returns `false` only for a zero-capacity cache.
    pub(crate) fn admit(&mut self, key: K, value: V) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.store.len() >= self.capacity {
            if self.store.replace_stale(key, value).is_some() {
                trace!(capacity = self.capacity, "evicted least recently used entry");
            }
        } else {
            self.store.push_fresh(key, value);
        }
        true
    }
}

impl<K, V, B> RecencyCache for LruCache<K, V, B>
where
    K: Hash + Eq,
    B: RecencyStore<K, V>,
{
    type Key = K;
    type Value = V;

    fn find(&mut self, key: &K) -> Option<&V> {
        LruCache::find(self, key)
    }

    fn contains(&mut self, key: &K) -> bool {
        LruCache::contains(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> bool {
        LruCache::insert(self, key, value)
    }

    fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        LruCache::try_emplace_with(self, key, make)
    }

    fn update(&mut self, key: K, value: V) {
        LruCache::update(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        LruCache::remove(self, key)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn capacity(&self) -> usize {
        LruCache::capacity(self)
    }

    fn clear(&mut self) {
        LruCache::clear(self)
    }

    fn reserve(&mut self, capacity: usize) {
        LruCache::reserve(self, capacity)
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        LruCache::check_invariants(self)
    }
}

impl<K, V, B> Extend<(K, V)> for LruCache<K, V, B>
where
    B: RecencyStore<K, V>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, B> fmt::Debug for LruCache<K, V, B>
where
    B: RecencyStore<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.store.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::linked_map::LinkedMapStore;

    /// Runs the same behavioural suite against every storage strategy.
    macro_rules! lru_behaviour {
        ($name:ident, $store:ty) => {
            mod $name {
                use super::*;

                type Cache = LruCache<u32, String, $store>;

                fn cache(capacity: usize) -> Cache {
                    LruCache::with_hasher(capacity, Default::default())
                }

                fn order(cache: &Cache) -> Vec<u32> {
                    cache.iter().map(|(k, _)| *k).collect()
                }

                #[test]
                fn emplace_evicts_then_reset_clears() {
                    let mut c = cache(2);
                    assert!(c.emplace(0, "aaaa"));
                    assert!(c.emplace(1, "bbbb"));
                    assert!(c.emplace(2, "cccc"));
                    assert!(!c.contains(&0));
                    assert!(c.contains(&1));
                    assert!(c.contains(&2));
                    assert_eq!(c.len(), 2);

                    c.reset(4);
                    assert_eq!(c.len(), 0);
                    assert_eq!(c.capacity(), 4);

                    assert!(c.emplace(0, "aaaa"));
                    assert!(c.contains(&0));
                    assert!(!c.contains(&1));
                    assert!(!c.contains(&2));
                    c.check_invariants().unwrap();
                }

                #[test]
                fn oldest_key_is_evicted_first() {
                    let mut c = cache(3);
                    for k in 0..=3 {
                        c.insert(k, k.to_string());
                    }
                    assert!(c.peek(&0).is_none());
                    assert_eq!(order(&c), vec![3, 2, 1]);
                }

                #[test]
                fn find_and_contains_promote() {
                    let mut c = cache(3);
                    for k in 0..3 {
                        c.insert(k, k.to_string());
                    }
                    assert_eq!(c.find(&0).map(String::as_str), Some("0"));
                    assert!(c.contains(&1));
                    assert_eq!(order(&c), vec![1, 0, 2]);

                    c.insert(3, "3".into());
                    assert!(c.peek(&2).is_none());
                    assert_eq!(c.len(), 3);
                }

                #[test]
                fn lookups_do_not_change_len() {
                    let mut c = cache(4);
                    c.insert(1, "one".into());
                    for _ in 0..10 {
                        assert!(c.contains(&1));
                        assert!(c.find(&1).is_some());
                        assert!(!c.contains(&2));
                    }
                    assert_eq!(c.len(), 1);
                }

                #[test]
                fn insert_existing_keeps_value_and_promotes() {
                    let mut c = cache(2);
                    c.insert(1, "first".into());
                    c.insert(2, "second".into());
                    assert!(!c.insert(1, "ignored".into()));
                    assert_eq!(c.peek(&1).map(String::as_str), Some("first"));
                    assert_eq!(order(&c), vec![1, 2]);
                }

                #[test]
                fn update_replaces_in_place_or_inserts() {
                    let mut c = cache(2);
                    c.update(1, "one".into());
                    c.update(2, "two".into());
                    c.update(1, "uno".into());
                    assert_eq!(order(&c), vec![1, 2]);
                    assert_eq!(c.peek(&1).map(String::as_str), Some("uno"));

                    c.update(3, "three".into());
                    assert!(c.peek(&2).is_none());
                    assert_eq!(c.len(), 2);
                    c.check_invariants().unwrap();
                }

                #[test]
                fn emplace_skips_construction_on_hit() {
                    let mut c = cache(2);
                    c.insert(1, "one".into());
                    let mut built = false;
                    assert!(!c.emplace_with(1, || {
                        built = true;
                        "other".to_string()
                    }));
                    assert!(!built);
                }

                #[test]
                fn failed_construction_leaves_cache_untouched() {
                    let mut c = cache(1);
                    c.insert(1, "one".into());
                    let result: Result<bool, &str> = c.try_emplace_with(2, || Err("nope"));
                    assert_eq!(result, Err("nope"));
                    assert_eq!(c.peek(&1).map(String::as_str), Some("one"));
                    assert_eq!(c.len(), 1);
                }

                #[test]
                fn remove_is_noop_when_absent() {
                    let mut c = cache(2);
                    c.insert(1, "one".into());
                    assert_eq!(c.remove(&1).as_deref(), Some("one"));
                    assert_eq!(c.remove(&1), None);
                    assert!(c.is_empty());
                }

                #[test]
                fn zero_capacity_always_misses() {
                    let mut c = cache(0);
                    assert!(!c.insert(1, "one".into()));
                    assert!(!c.emplace(2, "two"));
                    c.update(3, "three".into());
                    assert!(!c.contains(&1));
                    assert!(c.find(&3).is_none());
                    assert_eq!(c.len(), 0);
                    c.check_invariants().unwrap();
                }

                #[test]
                fn reserve_grows_without_clearing() {
                    let mut c = cache(2);
                    c.insert(1, "one".into());
                    c.insert(2, "two".into());
                    c.reserve(4);
                    assert_eq!(c.capacity(), 4);
                    c.insert(3, "three".into());
                    c.insert(4, "four".into());
                    assert_eq!(c.len(), 4);
                    assert!(c.contains(&1));
                }

                #[test]
                fn reserve_shrink_evicts_stale_end() {
                    let mut c = cache(4);
                    for k in 0..4 {
                        c.insert(k, k.to_string());
                    }
                    c.reserve(2);
                    assert_eq!(order(&c), vec![3, 2]);
                    c.check_invariants().unwrap();
                }

                #[test]
                fn pop_and_peek_stale() {
                    let mut c = cache(3);
                    for k in 0..3 {
                        c.insert(k, k.to_string());
                    }
                    assert_eq!(c.peek_stale().map(|(k, _)| *k), Some(0));
                    assert_eq!(c.pop_stale().map(|(k, _)| k), Some(0));
                    assert_eq!(c.len(), 2);
                }

                #[test]
                fn clear_keeps_capacity() {
                    let mut c = cache(3);
                    c.extend((0..3).map(|k| (k, k.to_string())));
                    c.clear();
                    assert!(c.is_empty());
                    assert_eq!(c.capacity(), 3);
                    c.check_invariants().unwrap();
                }
            }
        };
    }

    lru_behaviour!(node_store, NodeStore<u32, String>);
    lru_behaviour!(linked_map_store, LinkedMapStore<u32, String>);

    #[test]
    fn usable_through_recency_cache_trait() {
        fn fill<C: RecencyCache<Key = u32, Value = u32>>(cache: &mut C) {
            for k in 0..10 {
                cache.emplace(k, k * 2);
            }
        }
        let mut c: LruCache<u32, u32> = LruCache::new(4);
        fill(&mut c);
        assert_eq!(c.len(), 4);
        assert_eq!(c.find(&9), Some(&18));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert(u8, u16),
            Find(u8),
            Update(u8, u16),
            Remove(u8),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..16, any::<u16>()).prop_map(|(k, v)| Op::Insert(k, v)),
                (0u8..16).prop_map(Op::Find),
                (0u8..16, any::<u16>()).prop_map(|(k, v)| Op::Update(k, v)),
                (0u8..16).prop_map(Op::Remove),
            ]
        }

        /// Reference model: a plain vector ordered fresh to stale.
        struct Model {
            capacity: usize,
            entries: Vec<(u8, u16)>,
        }

        impl Model {
            fn touch(&mut self, key: u8) -> Option<u16> {
                let pos = self.entries.iter().position(|(k, _)| *k == key)?;
                let entry = self.entries.remove(pos);
                self.entries.insert(0, entry);
                Some(entry.1)
            }

            fn insert(&mut self, key: u8, value: u16) -> bool {
                if self.touch(key).is_some() || self.capacity == 0 {
                    return false;
                }
                if self.entries.len() >= self.capacity {
                    self.entries.pop();
                }
                self.entries.insert(0, (key, value));
                true
            }

            fn update(&mut self, key: u8, value: u16) {
                if self.touch(key).is_some() {
                    self.entries[0].1 = value;
                } else {
                    self.insert(key, value);
                }
            }

            fn remove(&mut self, key: u8) -> Option<u16> {
                let pos = self.entries.iter().position(|(k, _)| *k == key)?;
                Some(self.entries.remove(pos).1)
            }
        }

        fn run<B: RecencyStore<u8, u16>>(
            mut cache: LruCache<u8, u16, B>,
            capacity: usize,
            ops: &[Op],
        ) -> Result<(), TestCaseError> {
            let mut model = Model {
                capacity,
                entries: Vec::new(),
            };
            for op in ops {
                match *op {
                    Op::Insert(k, v) => prop_assert_eq!(cache.insert(k, v), model.insert(k, v)),
                    Op::Find(k) => prop_assert_eq!(cache.find(&k).copied(), model.touch(k)),
                    Op::Update(k, v) => {
                        cache.update(k, v);
                        model.update(k, v);
                    },
                    Op::Remove(k) => prop_assert_eq!(cache.remove(&k), model.remove(k)),
                }
                prop_assert!(cache.len() <= cache.capacity());
                let seen: Vec<(u8, u16)> = cache.iter().map(|(k, v)| (*k, *v)).collect();
                prop_assert_eq!(&seen, &model.entries);
                prop_assert!(cache.check_invariants().is_ok());
            }
            Ok(())
        }

        proptest! {
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_node_store_matches_model(
                capacity in 0usize..8,
                ops in prop::collection::vec(op(), 0..200)
            ) {
                run(LruCache::<u8, u16>::new(capacity), capacity, &ops)?;
            }

            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_linked_map_store_matches_model(
                capacity in 0usize..8,
                ops in prop::collection::vec(op(), 0..200)
            ) {
                let cache: LruCache<u8, u16, LinkedMapStore<u8, u16>> =
                    LruCache::with_hasher(capacity, Default::default());
                run(cache, capacity, &ops)?;
            }
        }
    }
}
