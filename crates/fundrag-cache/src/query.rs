use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use fundrag_core::error::Result;
use fundrag_core::types::SourceTag;

use crate::clock::{Clock, SystemClock};
use crate::lru_ttl::{CacheStats, TtlLruCache};

pub const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(5 * 60);

/// Full serialized responses keyed by the request that produced them.
pub struct QueryCache {
    cache: TtlLruCache<String>,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { cache: TtlLruCache::with_clock(capacity, ttl, clock) }
    }

    /// Digest of `(normalized query, mode, top_k, filter)`.
    pub fn key(query: &str, mode: &str, top_k: usize, source_filter: Option<SourceTag>) -> String {
        let filter = source_filter.map(SourceTag::as_str).unwrap_or("");
        let material = format!("{}|{mode}|{top_k}|{filter}", normalize_query(query));
        format!("query:{}", blake3::hash(material.as_bytes()).to_hex())
    }

    /// A stored value that no longer deserializes as `T` is dropped and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable query cache entry");
                self.cache.delete(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.cache.set(key, raw, None);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.cache.delete(key)
    }

    /// Called after a reindex so stale responses are not served.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Lower-cases, trims and collapses internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Response {
        ids: Vec<String>,
    }

    #[test]
    fn trivially_different_queries_share_a_key() {
        let a = QueryCache::key("What is  a Mutual Fund?", "hybrid", 5, None);
        let b = QueryCache::key("  what is a mutual fund? ", "hybrid", 5, None);
        assert_eq!(a, b);
        assert!(a.starts_with("query:"));
    }

    #[test]
    fn mode_top_k_and_filter_separate_keys() {
        let base = QueryCache::key("nav", "hybrid", 5, None);
        assert_ne!(base, QueryCache::key("nav", "lexical", 5, None));
        assert_ne!(base, QueryCache::key("nav", "hybrid", 3, None));
        assert_ne!(base, QueryCache::key("nav", "hybrid", 5, Some(SourceTag::Faq)));
    }

    #[test]
    fn typed_round_trip_and_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = QueryCache::with_clock(8, DEFAULT_QUERY_TTL, clock.clone());
        let key = QueryCache::key("nav", "hybrid", 5, None);
        let value = Response { ids: vec!["faq_1".into()] };

        cache.set(key.clone(), &value).expect("serialize");
        assert_eq!(cache.get::<Response>(&key), Some(value));

        clock.advance(DEFAULT_QUERY_TTL);
        assert_eq!(cache.get::<Response>(&key), None);
    }

    #[test]
    fn undecodable_entry_is_a_miss() {
        let cache = QueryCache::new(8, DEFAULT_QUERY_TTL);
        cache.set("k", &42u32).expect("serialize");
        assert_eq!(cache.get::<Response>("k"), None);
        assert_eq!(cache.stats().size, 0);
    }
}
