//! Error types for the shardcache library.
//!
//! Lookups, misses, duplicate inserts and expirations are never errors; they
//! surface as `bool` or `Option` results on the cache types. The types here
//! cover the two remaining cases:
//!
//! - [`ConfigError`]: a `CacheBuilder::try_build_*` call was given parameters
//!   it refuses (zero capacity, zero shards, zero time-to-live).
//! - [`InvariantError`]: a `check_invariants` call found the index and the
//!   recency list out of step.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::builder::CacheBuilder;
//! use shardcache::error::ConfigError;
//!
//! let bad: Result<_, ConfigError> = CacheBuilder::new(0).try_build_lru::<u64, u64>();
//! assert!(bad.unwrap_err().to_string().contains("capacity"));
//! ```

use thiserror::Error;

/// Internal invariant violation reported by `check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Rejected cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
    #[error("shard count must be greater than zero")]
    ZeroShards,
    #[error("time-to-live must be greater than zero")]
    ZeroTimeToLive,
}
