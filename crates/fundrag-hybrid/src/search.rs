use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fundrag_core::config::RetrievalSettings;
use fundrag_core::error::{Error, Result};
use fundrag_core::traits::{TextIndexer, VectorIndexer};
use fundrag_core::types::{FusedResult, RankedResult, SourceTag};

use crate::fusion::{rrf_fuse, validate_alpha, DEFAULT_RRF_K};

pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

/// Runs the keyword and vector searches side by side and fuses them.
///
/// The lexical engine is synchronous, so it runs on the blocking pool while
/// the vector search is awaited on the current task. Both must succeed.
pub struct HybridSearcher<TI: ?Sized, VI: ?Sized> {
    text: Arc<TI>,
    vector: Arc<VI>,
    k_rrf: f64,
    candidate_multiplier: usize,
    timeout: Option<Duration>,
}

impl<TI, VI> HybridSearcher<TI, VI>
where
    TI: TextIndexer + ?Sized + 'static,
    VI: VectorIndexer + ?Sized,
{
    pub fn new(text: Arc<TI>, vector: Arc<VI>) -> Self {
        Self { text, vector, k_rrf: DEFAULT_RRF_K, candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER, timeout: None }
    }

    pub fn from_settings(text: Arc<TI>, vector: Arc<VI>, settings: &RetrievalSettings) -> Self {
        Self::new(text, vector)
            .with_rrf_k(settings.rrf_k)
            .with_candidate_multiplier(settings.candidate_multiplier)
            .with_timeout(settings.query_timeout())
    }

    pub fn with_rrf_k(mut self, k_rrf: f64) -> Self {
        self.k_rrf = k_rrf;
        self
    }

    /// Each engine is asked for `top_k * multiplier` candidates (minimum 1x).
    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn text(&self) -> &Arc<TI> {
        &self.text
    }

    pub fn vector(&self) -> &Arc<VI> {
        &self.vector
    }

    /// Applies the per-query deadline. An abandoned blocking search runs to
    /// completion on its pool thread and is then dropped.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| Error::Timeout(limit))?,
            None => fut.await,
        }
    }

    async fn lexical_candidates(&self, query: &str, k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
        let text = Arc::clone(&self.text);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || text.search(&query, k, source_filter))
            .await
            .map_err(|e| Error::Operation(format!("lexical search task failed: {e}")))?
    }

    pub async fn search_lexical(&self, query: &str, top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
        self.bounded(self.lexical_candidates(query, top_k, source_filter)).await
    }

    pub async fn search_vector(&self, query_vector: &[f32], top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
        self.bounded(self.vector.search(query_vector, top_k, source_filter)).await
    }

    /// Fused top `top_k` for `query`. `alpha` weights the vector ranking:
    /// 0 is keyword only, 1 is vector only.
    pub async fn search(
        &self,
        query: &str,
        query_vector: &[f32],
        top_k: usize,
        source_filter: Option<SourceTag>,
        alpha: f64,
    ) -> Result<Vec<FusedResult>> {
        validate_alpha(alpha)?;
        if top_k == 0 {
            return Ok(vec![]);
        }
        let fetch_k = top_k.saturating_mul(self.candidate_multiplier);

        let retrieval = async {
            tokio::try_join!(
                self.lexical_candidates(query, fetch_k, source_filter),
                self.vector.search(query_vector, fetch_k, source_filter),
            )
        };
        let (lexical, vector) = self.bounded(retrieval).await?;
        tracing::debug!(fetch_k, lexical = lexical.len(), vector = vector.len(), "hybrid candidates");

        rrf_fuse(&lexical, &vector, alpha, self.k_rrf, top_k)
    }
}
