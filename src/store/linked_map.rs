//! Linked-map store: a key-indexed map plus a list of key copies.
//!
//! ```text
//!   map (HashMap<K, Slot<V>>)                 order (IntrusiveList<K>)
//!   ┌──────────────────────────────┐
//!   │ k2 ─► { value: v2, pos: p2 } │────────► head ─► [p2: k2] ◄──► [p0: k0] ◄── tail
//!   │ k0 ─► { value: v0, pos: p0 } │─────────────────────────────────┘
//!   └──────────────────────────────┘
//! ```
//!
//! Each map slot remembers its list position, so promotion and removal stay
//! O(1). The key is stored twice, which is why this store needs `K: Clone`.
//! Eviction overwrites the key held by the stale list node and moves that
//! node to the head; only the map entry is re-created.

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::mem;

use crate::ds::intrusive_list::{IntrusiveList, IntrusiveListIter};
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;
use crate::store::traits::{DefaultHashBuilder, RecencyStore};

struct Slot<V> {
    value: V,
    position: SlotId,
}

/// Map-backed store keeping recency in a separate list of keys.
pub struct LinkedMapStore<K, V, S = DefaultHashBuilder> {
    map: HashMap<K, Slot<V>, S>,
    order: IntrusiveList<K>,
}

impl<K, V, S> RecencyStore<K, V> for LinkedMapStore<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    type BuildHasher = S;
    type Iter<'a>
        = LinkedMapIter<'a, K, V, S>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, hash_builder),
            order: IntrusiveList::with_capacity(capacity),
        }
    }

    fn hasher(&self) -> &S {
        self.map.hasher()
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|slot| &slot.value)
    }

    #[inline]
    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key).map(|slot| &mut slot.value)
    }

    #[inline]
    fn promote(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.map.get_mut(key)?;
        self.order.move_to_front(slot.position);
        Some(&mut slot.value)
    }

    fn push_fresh(&mut self, key: K, value: V) {
        let position = self.order.push_front(key.clone());
        self.map.insert(key, Slot { value, position });
    }

    fn replace_stale(&mut self, key: K, value: V) -> Option<(K, V)> {
        let Some(stale) = self.order.back_id() else {
            self.push_fresh(key, value);
            return None;
        };

        let evicted_key = match self.order.get_mut(stale) {
            Some(held) => mem::replace(held, key.clone()),
            None => {
                self.push_fresh(key, value);
                return None;
            },
        };
        let evicted = self.map.remove(&evicted_key);
        self.order.move_to_front(stale);
        self.map.insert(
            key,
            Slot {
                value,
                position: stale,
            },
        );
        evicted.map(|slot| (evicted_key, slot.value))
    }

    fn pop_stale(&mut self) -> Option<(K, V)> {
        let key = self.order.pop_back()?;
        let slot = self.map.remove(&key)?;
        Some((key, slot.value))
    }

    fn peek_stale(&self) -> Option<(&K, &V)> {
        let key = self.order.back()?;
        self.map.get(key).map(|slot| (key, &slot.value))
    }

    fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let (key, slot) = self.map.remove_entry(key)?;
        self.order.remove(slot.position);
        Some((key, slot.value))
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn reserve(&mut self, capacity: usize) {
        self.map.reserve(capacity.saturating_sub(self.map.len()));
        self.order.reserve(capacity);
    }

    fn reset(&mut self, capacity: usize) {
        self.map.clear();
        self.map.shrink_to(capacity);
        self.map.reserve(capacity);
        self.order.reset(capacity);
    }

    fn iter(&self) -> LinkedMapIter<'_, K, V, S> {
        LinkedMapIter {
            keys: self.order.iter(),
            map: &self.map,
        }
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.order.validate()?;
        if self.map.len() != self.order.len() {
            return Err(InvariantError::new(format!(
                "map holds {} keys but the recency list holds {}",
                self.map.len(),
                self.order.len()
            )));
        }
        for (position, key) in self.order.iter_entries() {
            match self.map.get(key) {
                Some(slot) if slot.position == position => {},
                Some(slot) => {
                    return Err(InvariantError::new(format!(
                        "map slot points at position {} but the key is linked at {}",
                        slot.position.index(),
                        position.index()
                    )));
                },
                None => {
                    return Err(InvariantError::new(format!(
                        "list position {} holds a key missing from the map",
                        position.index()
                    )));
                },
            }
        }
        Ok(())
    }
}

impl<K, V, S> fmt::Debug for LinkedMapStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedMapStore")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Fresh-to-stale iterator over a [`LinkedMapStore`].
pub struct LinkedMapIter<'a, K, V, S> {
    keys: IntrusiveListIter<'a, K>,
    map: &'a HashMap<K, Slot<V>, S>,
}

impl<'a, K, V, S> Iterator for LinkedMapIter<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            if let Some(slot) = self.map.get(key) {
                return Some((key, &slot.value));
            }
        }
    }
}
