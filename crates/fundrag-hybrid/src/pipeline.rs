use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fundrag_cache::{CacheStats, EmbeddingCache, QueryCache};
use fundrag_core::config::Settings;
use fundrag_core::error::{Error, Result};
use fundrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use fundrag_core::types::{ContextBlock, FusedResult, Hit, SourceTag};
use fundrag_rerank::{fallback, Reranker};

use crate::fusion::validate_alpha;
use crate::readiness::Readiness;
use crate::search::HybridSearcher;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Lexical,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "keyword" | "bm25" => Ok(Self::Lexical),
            "semantic" | "vector" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Validation(format!("unknown search mode '{other}'"))),
        }
    }
}

/// One retrieval call. Unset knobs fall back to the pipeline's settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    pub mode: SearchMode,
    pub top_k: Option<usize>,
    pub source_filter: Option<SourceTag>,
    pub alpha: Option<f64>,
    pub rerank: bool,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), mode: SearchMode::Hybrid, top_k: None, source_filter: None, alpha: None, rerank: true }
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn source(mut self, tag: Option<SourceTag>) -> Self {
        self.source_filter = tag;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }
}

/// A complete ranked answer to one request.
///
/// `degraded` is set when the answer is knowingly weaker than asked for:
/// hybrid served from the keyword index alone, or a rerank that fell back to
/// fused order. Degraded responses are never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResponse {
    pub query: String,
    pub mode: SearchMode,
    pub hits: Vec<Hit>,
    pub degraded: bool,
    #[serde(default)]
    pub cached: bool,
}

impl RetrievalResponse {
    /// Rank-ordered blocks for prompt assembly.
    pub fn context_blocks(&self) -> Vec<ContextBlock> {
        self.hits.iter().map(Hit::to_context).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub lexical_ready: bool,
    pub vector_ready: bool,
    pub lexical_documents: usize,
    pub vector_documents: Option<usize>,
    pub query_cache: Option<CacheStats>,
    pub embedding_cache: Option<CacheStats>,
}

#[derive(Debug, Clone, Copy)]
struct Defaults {
    top_k: usize,
    alpha: f64,
    rerank_candidates: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { top_k: 5, alpha: 0.5, rerank_candidates: 3 }
    }
}

/// Query entry point: cache, embed, search, rerank.
pub struct RetrievalPipeline {
    searcher: HybridSearcher<dyn TextIndexer, dyn VectorIndexer>,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    readiness: Arc<Readiness>,
    query_cache: Option<Arc<QueryCache>>,
    embedding_cache: Option<Arc<EmbeddingCache>>,
    defaults: Defaults,
}

impl RetrievalPipeline {
    pub fn new(searcher: HybridSearcher<dyn TextIndexer, dyn VectorIndexer>, embedder: Arc<dyn Embedder>, readiness: Arc<Readiness>) -> Self {
        Self {
            searcher,
            embedder,
            reranker: Reranker::disabled(),
            readiness,
            query_cache: None,
            embedding_cache: None,
            defaults: Defaults::default(),
        }
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_query_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.query_cache = Some(cache);
        self
    }

    /// Only used for health reporting; the embedder does its own lookups.
    pub fn with_embedding_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.embedding_cache = Some(cache);
        self
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.defaults = Defaults {
            top_k: settings.retrieval.default_top_k,
            alpha: settings.retrieval.alpha,
            rerank_candidates: settings.rerank.top_k,
        };
        self
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::Validation("query is empty".into()));
        }
        let top_k = request.top_k.unwrap_or(self.defaults.top_k);
        if top_k == 0 {
            return Err(Error::Validation("top_k must be at least 1".into()));
        }
        let alpha = request.alpha.unwrap_or(self.defaults.alpha);
        validate_alpha(alpha)?;
        let rerank = request.rerank && self.reranker.is_enabled();
        // the reranker sees at least `rerank.top_k` candidates but the answer keeps `top_k`
        let fetch = if rerank { top_k.max(self.defaults.rerank_candidates) } else { top_k };

        let cache_key = self.query_cache.as_ref().map(|_| {
            // alpha and rerank change the answer, so they are part of the mode component
            let variant = format!("{}:{alpha}:{}", request.mode, if rerank { "rerank" } else { "fused" });
            QueryCache::key(query, &variant, top_k, request.source_filter)
        });
        if let (Some(cache), Some(key)) = (&self.query_cache, &cache_key) {
            if let Some(mut hit) = cache.get::<RetrievalResponse>(key) {
                tracing::debug!(mode = %request.mode, "query cache hit");
                hit.query = query.to_string();
                hit.cached = true;
                return Ok(hit);
            }
        }

        if !self.readiness.lexical_ready() && request.mode != SearchMode::Semantic {
            return Err(Error::unavailable("lexical index", "index not built"));
        }

        let (hits, degraded) = match request.mode {
            SearchMode::Lexical => (self.lexical_hits(query, fetch, request.source_filter).await?, false),
            SearchMode::Semantic => {
                if !self.readiness.vector_ready() {
                    return Err(Error::unavailable("vector store", "index not ready"));
                }
                let vector = self.embed_query(query).await?;
                let hits = self.searcher.search_vector(&vector, fetch, request.source_filter).await?;
                (hits.into_iter().map(Hit::Vector).collect(), false)
            }
            SearchMode::Hybrid if !self.readiness.vector_ready() => {
                tracing::warn!("vector index not ready, answering hybrid query from keyword index");
                (self.lexical_hits(query, fetch, request.source_filter).await?, true)
            }
            SearchMode::Hybrid => {
                let vector = self.embed_query(query).await?;
                let fused = self.searcher.search(query, &vector, fetch, request.source_filter, alpha).await?;
                (fused.into_iter().map(Hit::Fused).collect(), false)
            }
        };

        let (hits, degraded) = if rerank {
            let (reranked, fell_back) = self.rerank_hits(query, hits, top_k).await;
            (reranked, degraded || fell_back)
        } else {
            (hits, degraded)
        };

        let response = RetrievalResponse { query: query.to_string(), mode: request.mode, hits, degraded, cached: false };
        tracing::info!(mode = %request.mode, hits = response.hits.len(), degraded, "retrieval complete");

        if let (Some(cache), Some(key), false) = (&self.query_cache, cache_key, degraded) {
            if let Err(e) = cache.set(key, &response) {
                tracing::warn!(error = %e, "could not cache response");
            }
        }
        Ok(response)
    }

    /// Returns the reranked hits and whether the fused-order fallback was taken.
    async fn rerank_hits(&self, query: &str, hits: Vec<Hit>, top_k: usize) -> (Vec<Hit>, bool) {
        let candidates: Vec<FusedResult> = hits.into_iter().map(rerank_candidate).collect();
        match self.reranker.try_rerank(query, &candidates, top_k).await {
            Ok(reranked) => (reranked.into_iter().map(Hit::Reranked).collect(), false),
            Err(e) => {
                tracing::warn!(error = %e, "reranking failed, keeping fused order");
                (fallback(&candidates, top_k).into_iter().map(Hit::Reranked).collect(), true)
            }
        }
    }

    async fn lexical_hits(&self, query: &str, top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<Hit>> {
        let hits = self.searcher.search_lexical(query, top_k, source_filter).await?;
        Ok(hits.into_iter().map(Hit::Lexical).collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_query(&query))
            .await
            .map_err(|e| Error::Operation(format!("query embedding task failed: {e}")))?
    }

    pub async fn health(&self) -> HealthReport {
        let vector_documents = match self.searcher.vector().count().await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(error = %e, "vector index count failed during health check");
                None
            }
        };
        let lexical_ready = self.readiness.lexical_ready();
        let vector_ready = self.readiness.vector_ready() && vector_documents.is_some();
        HealthReport {
            status: if lexical_ready && vector_ready { HealthStatus::Healthy } else { HealthStatus::Degraded },
            lexical_ready,
            vector_ready,
            lexical_documents: self.searcher.text().count(),
            vector_documents,
            query_cache: self.query_cache.as_ref().map(|c| c.stats()),
            embedding_cache: self.embedding_cache.as_ref().map(|c| c.stats()),
        }
    }
}

/// Single-stage hits enter the reranker as fused results carrying only their
/// own rank, scored by what that stage ranked by.
fn rerank_candidate(hit: Hit) -> FusedResult {
    match hit {
        Hit::Fused(f) => f,
        Hit::Lexical(r) => FusedResult {
            fused_score: f64::from(r.score),
            lexical_rank: Some(r.rank),
            vector_rank: None,
            id: r.id,
            text: r.text,
            source_tag: r.source_tag,
            metadata: r.metadata,
        },
        Hit::Vector(r) => FusedResult {
            fused_score: f64::from(r.score),
            lexical_rank: None,
            vector_rank: Some(r.rank),
            id: r.id,
            text: r.text,
            source_tag: r.source_tag,
            metadata: r.metadata,
        },
        Hit::Reranked(r) => FusedResult {
            fused_score: r.rerank_score,
            lexical_rank: None,
            vector_rank: None,
            id: r.id,
            text: r.text,
            source_tag: r.source_tag,
            metadata: r.metadata,
        },
    }
}
