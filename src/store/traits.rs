//! Storage strategies for the recency engine.
//!
//! A store owns the hash index and the recency list and exposes the small
//! set of O(1) primitives the policies are written against. Policies decide
//! *when* to promote, admit or evict; stores decide *how* an entry is found,
//! linked and reused. Swapping one store for another never changes what a
//! cache observably does.
//!
//! | Store                                               | Index                      | List holds |
//! |-----------------------------------------------------|----------------------------|------------|
//! | [`NodeStore`](crate::store::node::NodeStore)        | `hashbrown::HashTable<SlotId>` | key + value (one slot per entry) |
//! | [`LinkedMapStore`](crate::store::linked_map::LinkedMapStore) | `HashMap<K, (V, SlotId)>` | key copy |

use std::hash::BuildHasher;

use crate::error::InvariantError;

/// Hash builder used when the caller does not supply one.
pub type DefaultHashBuilder = rustc_hash::FxBuildHasher;

/// Hash index + recency list with O(1) point operations.
///
/// The list has a *fresh* end (most recently touched) and a *stale* end
/// (least recently touched). Implementations must keep the index and the
/// list in bijection after every call.
pub trait RecencyStore<K, V> {
    /// Hash builder the index hashes keys with.
    type BuildHasher: BuildHasher;

    /// Iterator over entries from the fresh end to the stale end.
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Creates an empty store sized for `capacity` entries.
    fn with_capacity_and_hasher(capacity: usize, hash_builder: Self::BuildHasher) -> Self
    where
        Self: Sized;

    fn hasher(&self) -> &Self::BuildHasher;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks `key` up without touching recency.
    fn get(&self, key: &K) -> Option<&V>;

    /// Mutable lookup without touching recency.
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;

    /// Splices `key`'s entry to the fresh end and returns its value.
    fn promote(&mut self, key: &K) -> Option<&mut V>;

    /// Links a new entry at the fresh end. `key` must not be present.
    fn push_fresh(&mut self, key: K, value: V);

    /// Evicts the stale-end entry and stores `(key, value)` at the fresh end
    /// in its place, returning the evicted pair.
    ///
    /// `key` must not be present. On an empty store this is `push_fresh`.
    fn replace_stale(&mut self, key: K, value: V) -> Option<(K, V)>;

    /// Unlinks and returns the stale-end entry.
    fn pop_stale(&mut self) -> Option<(K, V)>;

    /// Stale-end entry, without touching recency.
    fn peek_stale(&self) -> Option<(&K, &V)>;

    /// Unlinks `key` from both the index and the list.
    fn remove(&mut self, key: &K) -> Option<(K, V)>;

    fn clear(&mut self);

    /// Grows the index and list storage to hold `capacity` entries.
    fn reserve(&mut self, capacity: usize);

    /// Drops every entry and re-sizes storage for `capacity` entries.
    fn reset(&mut self, capacity: usize);

    fn iter(&self) -> Self::Iter<'_>;

    /// Verifies the index/list bijection and list links.
    fn check_invariants(&self) -> Result<(), InvariantError>;
}
