use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::lru_ttl::{CacheStats, TtlLruCache};

pub const DEFAULT_EMBEDDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Embedding vectors keyed by a blake3 digest of the input text.
///
/// Keys are namespaced by embedder id so a model swap never serves vectors
/// from the previous model.
pub struct EmbeddingCache {
    namespace: String,
    cache: TtlLruCache<Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(namespace: impl Into<String>, capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(namespace, capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(namespace: impl Into<String>, capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { namespace: namespace.into(), cache: TtlLruCache::with_clock(capacity, ttl, clock) }
    }

    pub fn key(&self, text: &str) -> String {
        format!("{}:{}", self.namespace, blake3::hash(text.as_bytes()).to_hex())
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.get(&self.key(text))
    }

    pub fn set(&self, text: &str, embedding: Vec<f32>) {
        self.cache.set(self.key(text), embedding, None);
    }

    /// Splits a batch into hits and misses. The first vector is aligned with
    /// `texts`; the second lists the positions that must be embedded.
    pub fn get_batch(&self, texts: &[String]) -> (Vec<Option<Vec<f32>>>, Vec<usize>) {
        let found: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.get(t)).collect();
        let missing = found.iter().enumerate().filter(|(_, v)| v.is_none()).map(|(i, _)| i).collect();
        (found, missing)
    }

    pub fn set_batch<'a>(&self, texts: impl IntoIterator<Item = &'a String>, embeddings: impl IntoIterator<Item = Vec<f32>>) {
        for (text, embedding) in texts.into_iter().zip(embeddings) {
            self.set(text, embedding);
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_partitions_hits_and_misses() {
        let cache = EmbeddingCache::new("hash-xx64", 16, DEFAULT_EMBEDDING_TTL);
        cache.set("alpha", vec![1.0, 0.0]);
        cache.set("gamma", vec![0.0, 1.0]);

        let texts: Vec<String> = ["alpha", "beta", "gamma", "delta"].iter().map(|s| s.to_string()).collect();
        let (found, missing) = cache.get_batch(&texts);

        assert_eq!(missing, vec![1, 3]);
        assert_eq!(found[0], Some(vec![1.0, 0.0]));
        assert_eq!(found[2], Some(vec![0.0, 1.0]));
        assert!(found[1].is_none() && found[3].is_none());
    }

    #[test]
    fn keys_are_namespaced_by_model() {
        let a = EmbeddingCache::new("model-a", 4, DEFAULT_EMBEDDING_TTL);
        let b = EmbeddingCache::new("model-b", 4, DEFAULT_EMBEDDING_TTL);
        assert_ne!(a.key("same text"), b.key("same text"));
        assert_eq!(a.key("same text"), a.key("same text"));
    }
}
