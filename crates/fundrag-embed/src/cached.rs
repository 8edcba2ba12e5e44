use std::sync::Arc;

use fundrag_cache::EmbeddingCache;
use fundrag_core::error::{Error, Result};
use fundrag_core::traits::Embedder;

/// Wraps an embedder so only cache misses reach the model.
pub struct CachedEmbedder<E: ?Sized> {
    inner: Arc<E>,
    cache: Arc<EmbeddingCache>,
}

impl<E: Embedder + ?Sized> CachedEmbedder<E> {
    pub fn new(inner: Arc<E>, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

impl<E: Embedder + ?Sized> Embedder for CachedEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (mut found, missing) = self.cache.get_batch(texts);
        tracing::debug!(batch = texts.len(), misses = missing.len(), "embedding cache lookup");

        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&to_embed)?;
            if fresh.len() != to_embed.len() {
                return Err(Error::Validation(format!(
                    "embedder returned {} vectors for {} texts",
                    fresh.len(),
                    to_embed.len()
                )));
            }
            let dim = self.inner.dim();
            if let Some(bad) = fresh.iter().find(|v| v.len() != dim) {
                return Err(Error::Validation(format!("embedder returned a {}-d vector, expected {dim}", bad.len())));
            }
            for (&pos, vector) in missing.iter().zip(fresh) {
                self.cache.set(&texts[pos], vector.clone());
                found[pos] = Some(vector);
            }
        }

        found
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Operation("embedding missing after cache fill".into())))
            .collect()
    }
}
