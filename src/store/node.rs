//! Single-node store: one arena slot per entry, indexed by slot id.
//!
//! ## Architecture
//!
//! ```text
//!   index (HashTable<SlotId>)          list (IntrusiveList<Entry<K, V>>)
//!   ┌──────────────────────┐
//!   │ hash(k2) ─► id_2     │───┐      head ─► [id_2: k2,v2] ◄──► [id_0: k0,v0] ◄── tail
//!   │ hash(k0) ─► id_0     │───┼────────────────────────────────────┘   (fresh)      (stale)
//!   └──────────────────────┘   └──► same slot
//! ```
//!
//! The index stores nothing but slot ids and resolves key equality through
//! the slot, so the key lives exactly once. Lookup and list membership name
//! the same slot.
//!
//! ## Eviction reuses the stale slot
//!
//! ```text
//!   replace_stale(k3, v3):
//!     1. unindex tail slot (hash of its current key)
//!     2. overwrite key/value in place
//!     3. splice slot to head
//!     4. index slot under hash(k3)
//! ```
//!
//! Once the cache has filled, admitting a key never allocates: the arena,
//! the list links and the index bucket are all recycled.

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::mem;

use hashbrown::HashTable;

use crate::ds::intrusive_list::{IntrusiveList, IntrusiveListIter};
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;
use crate::store::traits::{DefaultHashBuilder, RecencyStore};

struct Entry<K, V> {
    key: K,
    value: V,
}

/// Arena-backed store holding key, value and links in one slot.
pub struct NodeStore<K, V, S = DefaultHashBuilder> {
    index: HashTable<SlotId>,
    list: IntrusiveList<Entry<K, V>>,
    hash_builder: S,
}

impl<K, V, S> NodeStore<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn slot_of(&self, key: &K) -> Option<SlotId> {
        let hash = self.hash_builder.hash_one(key);
        let list = &self.list;
        self.index
            .find(hash, |&id| list.get(id).is_some_and(|entry| entry.key == *key))
            .copied()
    }

    fn index_slot(&mut self, id: SlotId, hash: u64) {
        let list = &self.list;
        let hash_builder = &self.hash_builder;
        self.index.insert_unique(hash, id, |&other| {
            list.get(other)
                .map_or(0, |entry| hash_builder.hash_one(&entry.key))
        });
    }

    fn unindex_slot(&mut self, id: SlotId) -> bool {
        let hash = match self.list.get(id) {
            Some(entry) => self.hash_builder.hash_one(&entry.key),
            None => return false,
        };
        match self.index.find_entry(hash, |&other| other == id) {
            Ok(occupied) => {
                occupied.remove();
                true
            },
            Err(_) => false,
        }
    }
}

impl<K, V, S> RecencyStore<K, V> for NodeStore<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type BuildHasher = S;
    type Iter<'a>
        = NodeIter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            list: IntrusiveList::with_capacity(capacity),
            hash_builder,
        }
    }

    fn hasher(&self) -> &S {
        &self.hash_builder
    }

    #[inline]
    fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        let id = self.slot_of(key)?;
        self.list.get(id).map(|entry| &entry.value)
    }

    #[inline]
    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.slot_of(key)?;
        self.list.get_mut(id).map(|entry| &mut entry.value)
    }

    #[inline]
    fn promote(&mut self, key: &K) -> Option<&mut V> {
        let id = self.slot_of(key)?;
        self.list.move_to_front(id);
        self.list.get_mut(id).map(|entry| &mut entry.value)
    }

    fn push_fresh(&mut self, key: K, value: V) {
        let hash = self.hash_builder.hash_one(&key);
        let id = self.list.push_front(Entry { key, value });
        self.index_slot(id, hash);
    }

    fn replace_stale(&mut self, key: K, value: V) -> Option<(K, V)> {
        let Some(stale) = self.list.back_id() else {
            self.push_fresh(key, value);
            return None;
        };

        let hash = self.hash_builder.hash_one(&key);
        self.unindex_slot(stale);
        let evicted = match self.list.get_mut(stale) {
            Some(entry) => (
                mem::replace(&mut entry.key, key),
                mem::replace(&mut entry.value, value),
            ),
            None => {
                self.push_fresh(key, value);
                return None;
            },
        };
        self.list.move_to_front(stale);
        self.index_slot(stale, hash);
        Some(evicted)
    }

    fn pop_stale(&mut self) -> Option<(K, V)> {
        let stale = self.list.back_id()?;
        self.unindex_slot(stale);
        self.list
            .remove(stale)
            .map(|entry| (entry.key, entry.value))
    }

    fn peek_stale(&self) -> Option<(&K, &V)> {
        self.list.back().map(|entry| (&entry.key, &entry.value))
    }

    fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_builder.hash_one(key);
        let list = &self.list;
        let occupied = self
            .index
            .find_entry(hash, |&id| list.get(id).is_some_and(|entry| entry.key == *key))
            .ok()?;
        let (id, _) = occupied.remove();
        self.list
            .remove(id)
            .map(|entry| (entry.key, entry.value))
    }

    fn clear(&mut self) {
        self.index.clear();
        self.list.clear();
    }

    fn reserve(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.index.len());
        let list = &self.list;
        let hash_builder = &self.hash_builder;
        self.index.reserve(additional, |&id| {
            list.get(id)
                .map_or(0, |entry| hash_builder.hash_one(&entry.key))
        });
        self.list.reserve(capacity);
    }

    fn reset(&mut self, capacity: usize) {
        self.index = HashTable::with_capacity(capacity);
        self.list.reset(capacity);
    }

    fn iter(&self) -> NodeIter<'_, K, V> {
        NodeIter {
            inner: self.list.iter(),
        }
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.validate()?;
        if self.index.len() != self.list.len() {
            return Err(InvariantError::new(format!(
                "index holds {} slots but the recency list holds {}",
                self.index.len(),
                self.list.len()
            )));
        }
        for (id, entry) in self.list.iter_entries() {
            if self.slot_of(&entry.key) != Some(id) {
                return Err(InvariantError::new(format!(
                    "slot {} is linked but its key does not resolve to it",
                    id.index()
                )));
            }
        }
        Ok(())
    }
}

impl<K, V, S> fmt::Debug for NodeStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("len", &self.list.len())
            .finish_non_exhaustive()
    }
}

/// Fresh-to-stale iterator over a [`NodeStore`].
pub struct NodeIter<'a, K, V> {
    inner: IntrusiveListIter<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for NodeIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| (&entry.key, &entry.value))
    }
}
