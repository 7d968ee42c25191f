pub mod lru;
pub mod ttl;
