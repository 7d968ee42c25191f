pub use crate::builder::{Cache, CacheBuilder, CachePolicy};
pub use crate::ds::{IntrusiveList, ShardSelector, SlotArena, SlotId};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::policy::lru::LruCache;
pub use crate::policy::ttl::{Expiring, TtlCache};
pub use crate::store::{DefaultHashBuilder, LinkedMapStore, NodeStore, RecencyStore};
pub use crate::traits::RecencyCache;

#[cfg(feature = "concurrency")]
pub use crate::lock::{OsMutex, RawMutex, SpinLock};
#[cfg(feature = "concurrency")]
pub use crate::sharded::{ConcurrentLruCache, ConcurrentTtlCache, ShardedCache};
