use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, RankedResult, SourceTag};

pub trait Embedder: Send + Sync {
    /// Stable identifier of the model actually in use (e.g. `hash-xx64`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::Operation("embedder returned no vector".into()))
    }
}

/// Keyword index. Rebuilding is cheap and happens on every startup.
pub trait TextIndexer: Send + Sync {
    fn index(&self, documents: &[Document]) -> Result<()>;
    fn search(&self, query: &str, top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>>;
    fn clear(&self) -> Result<()>;
    fn count(&self) -> usize;
}

/// Dense index backed by an external engine. Rebuilding is expensive.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    async fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()>;
    async fn search(&self, query_vector: &[f32], top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>>;
    async fn clear(&self) -> Result<()>;
    async fn count(&self) -> Result<usize>;
}
