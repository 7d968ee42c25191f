//! shardcache: in-process LRU and TTL caches with O(1) point operations,
//! plus sharded, independently locked wrappers for concurrent use.
//!
//! ```text
//!   caller ──► ShardedCache (shard selection + lock)
//!                   │
//!                   ▼
//!              LruCache / TtlCache (promote, admit, evict, expire)
//!                   │
//!                   ▼
//!              RecencyStore (hash index + recency list)
//! ```
//!
//! See `DESIGN.md` for the module layout and invariants.

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod store;
pub mod traits;

#[cfg(feature = "concurrency")]
pub mod lock;
#[cfg(feature = "concurrency")]
pub mod sharded;
