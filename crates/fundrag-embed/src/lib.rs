use std::sync::Arc;

use fundrag_core::config::EmbeddingSettings;
use fundrag_core::traits::Embedder;

pub mod cached;
pub mod hashing;

pub use cached::CachedEmbedder;
pub use hashing::HashEmbedder;

pub const FALLBACK_MODEL: &str = "hash-xx64";
pub const FALLBACK_DIM: usize = 384;

/// Resolves the configured model to an embedder. Models this build cannot
/// load fall back to the hashing embedder, which changes `model_id()` and
/// `dim()`; index bootstrap sees that as a model change and rebuilds.
pub fn load_embedder(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    if settings.model.starts_with("hash-") {
        tracing::info!(model = %settings.model, dim = settings.dimension, "using hashing embedder");
        return Arc::new(HashEmbedder::new(settings.model.clone(), settings.dimension));
    }
    tracing::warn!(
        requested = %settings.model,
        fallback = FALLBACK_MODEL,
        dim = FALLBACK_DIM,
        "embedding model unavailable, falling back"
    );
    Arc::new(HashEmbedder::new(FALLBACK_MODEL, FALLBACK_DIM))
}
