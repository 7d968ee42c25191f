// ==============================================
// CROSS-POLICY INVARIANT TESTS (integration)
// ==============================================
//
// Behaviour that must hold for every cache flavour and every storage
// strategy alike.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardcache::policy::lru::LruCache;
use shardcache::policy::ttl::{Expiring, TtlCache};
use shardcache::store::{LinkedMapStore, NodeStore, RecencyStore};
use shardcache::traits::RecencyCache;
use std::time::Duration;

const LONG_TTL: Duration = Duration::from_secs(3600);

// ==============================================
// Capacity-0 Behavior
// ==============================================

mod zero_capacity {
    use super::*;

    fn always_misses<C: RecencyCache<Key = u32, Value = u32>>(mut cache: C) {
        assert_eq!(cache.capacity(), 0);
        assert!(!cache.insert(1, 1));
        assert!(!cache.emplace(2, 2u32));
        cache.update(3, 3);
        assert!(!cache.contains(&1));
        assert!(!cache.contains(&3));
        assert_eq!(cache.len(), 0, "a zero-capacity cache must stay empty");
        cache.check_invariants().unwrap();
    }

    #[test]
    fn lru_node_store() {
        always_misses(LruCache::<u32, u32>::new(0));
    }

    #[test]
    fn lru_linked_map_store() {
        always_misses(LruCache::<u32, u32, LinkedMapStore<u32, u32>>::with_hasher(
            0,
            Default::default(),
        ));
    }

    #[test]
    fn ttl_node_store() {
        always_misses(TtlCache::<u32, u32>::new(LONG_TTL, 0));
    }
}

// ==============================================
// Storage strategies are observably identical
// ==============================================

mod backend_equivalence {
    use super::*;

    fn drive<B: RecencyStore<u32, u64>>(cache: &mut LruCache<u32, u64, B>, seed: u64) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut log = Vec::new();
        for step in 0..5_000u64 {
            let key = rng.random_range(0..48u32);
            let line = match rng.random_range(0..5u8) {
                0 => format!("insert {}", cache.insert(key, step)),
                1 => format!("find {:?}", cache.find(&key)),
                2 => {
                    cache.update(key, step);
                    "update".to_string()
                },
                3 => format!("remove {:?}", cache.remove(&key)),
                _ => format!("contains {}", cache.contains(&key)),
            };
            log.push(line);
            assert!(cache.len() <= cache.capacity());
        }
        cache.check_invariants().unwrap();
        log.push(format!("{:?}", cache.iter().collect::<Vec<_>>()));
        log
    }

    #[test]
    fn node_and_linked_map_agree_on_random_workload() {
        for seed in [1, 7, 42, 0xDEAD_BEEF] {
            let mut node: LruCache<u32, u64, NodeStore<u32, u64>> = LruCache::new(16);
            let mut linked: LruCache<u32, u64, LinkedMapStore<u32, u64>> =
                LruCache::with_hasher(16, Default::default());
            assert_eq!(drive(&mut node, seed), drive(&mut linked, seed), "seed {seed}");
        }
    }

    #[test]
    fn ttl_backends_agree_while_nothing_expires() {
        let mut node: TtlCache<u32, u32> = TtlCache::new(LONG_TTL, 8);
        let mut linked: TtlCache<u32, u32, LinkedMapStore<u32, Expiring<u32>>> =
            TtlCache::with_hasher(LONG_TTL, 8, Default::default());
        let mut rng = StdRng::seed_from_u64(99);
        for step in 0..2_000u32 {
            let key = rng.random_range(0..24u32);
            if rng.random_bool(0.5) {
                assert_eq!(node.insert(key, step), linked.insert(key, step));
            } else {
                assert_eq!(node.find(&key), linked.find(&key));
            }
            assert_eq!(node.len(), linked.len());
        }
    }
}

// ==============================================
// Recency guarantees
// ==============================================

mod recency {
    use super::*;

    fn survives_capacity_minus_one_touches<C>(mut cache: C)
    where
        C: RecencyCache<Key = u32, Value = u32>,
    {
        let capacity = cache.capacity() as u32;
        for k in 0..capacity {
            cache.insert(k, k);
        }
        // Touch key 0, then capacity - 1 fresh keys: 0 must survive.
        assert!(cache.contains(&0));
        for k in capacity..(2 * capacity - 1) {
            cache.insert(k, k);
        }
        assert!(cache.contains(&0));
        assert_eq!(cache.len(), capacity as usize);
    }

    #[test]
    fn recently_touched_key_survives_lru() {
        survives_capacity_minus_one_touches(LruCache::<u32, u32>::new(10));
    }

    #[test]
    fn recently_touched_key_survives_ttl() {
        survives_capacity_minus_one_touches(TtlCache::<u32, u32>::new(LONG_TTL, 10));
    }

    #[test]
    fn filling_then_overflowing_evicts_only_the_first_key() {
        let mut cache: LruCache<u32, u32> = LruCache::new(5);
        for k in 0..=5 {
            cache.insert(k, k);
        }
        assert!(cache.peek(&0).is_none());
        for k in 1..=5 {
            assert!(cache.peek(&k).is_some(), "key {k} evicted too early");
        }
    }

    #[test]
    fn insert_then_find_returns_the_value() {
        let mut cache: LruCache<String, Vec<u8>> = LruCache::new(4);
        cache.insert("blob".into(), vec![1, 2, 3]);
        assert_eq!(cache.find(&"blob".to_string()), Some(&vec![1, 2, 3]));
    }
}
