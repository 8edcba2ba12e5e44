//! fundrag-cache
//!
//! Bounded LRU caches whose entries also expire after a TTL. The generic
//! `TtlLruCache` backs two specializations: `EmbeddingCache` (content-hash
//! keys, long TTL) and `QueryCache` (normalized query keys, short TTL).

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_imports)]

pub mod clock;
pub mod embedding;
pub mod lru_ttl;
pub mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use embedding::EmbeddingCache;
pub use lru_ttl::{CacheStats, TtlLruCache};
pub use query::QueryCache;
