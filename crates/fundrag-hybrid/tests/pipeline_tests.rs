mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use fundrag_cache::{EmbeddingCache, QueryCache};
use fundrag_core::error::{Error, Result};
use fundrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use fundrag_core::types::{Hit, SourceTag};
use fundrag_embed::{CachedEmbedder, HashEmbedder};
use fundrag_hybrid::{
    HealthStatus, HybridSearcher, IndexBootstrap, IndexStateManager, Readiness, RebuildDecision, RetrievalPipeline,
    RetrievalRequest, SearchMode,
};
use fundrag_rerank::{RerankRequest, RerankScore, RerankService, Reranker};
use fundrag_text::LexicalIndex;

use common::{larger_corpus, MemoryVectorIndex};

struct Harness {
    _dir: tempfile::TempDir,
    source: std::path::PathBuf,
    text: Arc<dyn TextIndexer>,
    vector: Arc<MemoryVectorIndex>,
    embedder: Arc<dyn Embedder>,
    readiness: Arc<Readiness>,
    query_cache: Arc<QueryCache>,
    embedding_cache: Arc<EmbeddingCache>,
}

impl Harness {
    fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("faqs.csv");
        fs::write(&source, "question,answer\nWhat is a mutual fund?,A pooled investment\n")?;
        let embedding_cache = Arc::new(EmbeddingCache::new("hash-xx64", 256, Duration::from_secs(3600)));
        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(Arc::new(HashEmbedder::new("hash-xx64", 64)), Arc::clone(&embedding_cache)));
        Ok(Self {
            _dir: dir,
            source,
            text: Arc::new(LexicalIndex::new()),
            vector: Arc::new(MemoryVectorIndex::new()),
            embedder,
            readiness: Arc::new(Readiness::new()),
            query_cache: Arc::new(QueryCache::new(64, Duration::from_secs(300))),
            embedding_cache,
        })
    }

    fn bootstrap(&self) -> IndexBootstrap {
        let state = IndexStateManager::new(
            self.source.with_file_name("index.state"),
            vec![self.source.clone()],
            self.embedder.model_id(),
            self.embedder.dim(),
        );
        let vector: Arc<dyn VectorIndexer> = self.vector.clone();
        IndexBootstrap::new(Arc::clone(&self.text), vector, Arc::clone(&self.embedder), state, Arc::clone(&self.readiness))
            .with_query_cache(Arc::clone(&self.query_cache))
    }

    fn pipeline(&self, reranker: Reranker) -> RetrievalPipeline {
        let vector: Arc<dyn VectorIndexer> = self.vector.clone();
        let searcher = HybridSearcher::new(Arc::clone(&self.text), vector);
        RetrievalPipeline::new(searcher, Arc::clone(&self.embedder), Arc::clone(&self.readiness))
            .with_reranker(reranker)
            .with_query_cache(Arc::clone(&self.query_cache))
            .with_embedding_cache(Arc::clone(&self.embedding_cache))
    }
}

struct FirstLast;

#[async_trait]
impl RerankService for FirstLast {
    fn name(&self) -> &str { "first-last" }
    async fn rerank(&self, request: &RerankRequest) -> Result<Vec<RerankScore>> {
        Ok((0..request.documents.len()).rev().take(request.top_n).map(|index| RerankScore { index, relevance_score: index as f64 }).collect())
    }
}

struct Down;

#[async_trait]
impl RerankService for Down {
    fn name(&self) -> &str { "down" }
    async fn rerank(&self, _request: &RerankRequest) -> Result<Vec<RerankScore>> {
        Err(Error::unavailable("reranker", "connection refused"))
    }
}

#[tokio::test]
async fn cold_start_rebuilds_then_warm_start_skips() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let docs = larger_corpus();

    let first = h.bootstrap().run(&docs, false).await?;
    assert_eq!(first.decision, RebuildDecision::Cold);
    assert!(first.rebuilt && first.vector_ready);
    assert_eq!(first.vector_documents, docs.len());
    assert_eq!(first.lexical_documents, docs.len());

    let second = h.bootstrap().run(&docs, false).await?;
    assert_eq!(second.decision, RebuildDecision::WarmMatched);
    assert!(!second.rebuilt);
    assert_eq!(h.vector.index_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let forced = h.bootstrap().run(&docs, true).await?;
    assert!(forced.forced && forced.rebuilt);
    Ok(())
}

#[tokio::test]
async fn changed_source_or_emptied_index_triggers_rebuild() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let docs = larger_corpus();
    h.bootstrap().run(&docs, false).await?;

    fs::write(&h.source, "question,answer\nWhat is a mutual fund?,A pooled vehicle\n")?;
    let stale = h.bootstrap().run(&docs, false).await?;
    assert_eq!(stale.decision, RebuildDecision::WarmStale);
    assert!(stale.rebuilt);

    h.vector.clear().await?;
    let corrupt = h.bootstrap().run(&docs, false).await?;
    assert_eq!(corrupt.decision, RebuildDecision::WarmCorrupt);
    assert!(corrupt.rebuilt);
    Ok(())
}

#[tokio::test]
async fn vector_outage_keeps_keyword_search_serving() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.vector.set_down(true);
    let report = h.bootstrap().run(&larger_corpus(), false).await?;
    assert!(!report.vector_ready);
    assert!(report.vector_error.is_some());
    assert!(h.readiness.lexical_ready() && !h.readiness.vector_ready());

    let pipeline = h.pipeline(Reranker::disabled());
    let hybrid = pipeline.retrieve(&RetrievalRequest::new("mutual fund")).await?;
    assert!(hybrid.degraded);
    assert!(!hybrid.hits.is_empty());
    assert!(hybrid.hits.iter().all(|hit| matches!(hit, Hit::Lexical(_))));

    let err = pipeline.retrieve(&RetrievalRequest::new("mutual fund").mode(SearchMode::Semantic)).await.expect_err("semantic needs vectors");
    assert!(matches!(err, Error::ServiceUnavailable { .. }));

    let health = pipeline.health().await;
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.lexical_documents, larger_corpus().len());

    // degraded answers are not cached
    assert!(!pipeline.retrieve(&RetrievalRequest::new("mutual fund")).await?.cached);
    Ok(())
}

#[tokio::test]
async fn modes_produce_their_own_hit_variants() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let pipeline = h.pipeline(Reranker::disabled());

    let lexical = pipeline.retrieve(&RetrievalRequest::new("redeem").mode(SearchMode::Lexical)).await?;
    assert_eq!(lexical.hits.first().map(Hit::id), Some("faq_1"));
    assert!(matches!(lexical.hits[0], Hit::Lexical(_)));

    let semantic = pipeline.retrieve(&RetrievalRequest::new("liquid debt").mode(SearchMode::Semantic).top_k(2)).await?;
    assert_eq!(semantic.hits.len(), 2);
    assert!(semantic.hits.iter().all(|hit| matches!(hit, Hit::Vector(_))));

    let hybrid = pipeline.retrieve(&RetrievalRequest::new("equity fund").source(Some(SourceTag::Fund))).await?;
    assert!(!hybrid.degraded);
    assert!(hybrid.hits.iter().all(|hit| matches!(hit, Hit::Fused(_)) && hit.source_tag() == SourceTag::Fund));

    let blocks = hybrid.context_blocks();
    assert_eq!(blocks.len(), hybrid.hits.len());
    assert_eq!(blocks[0].text, hybrid.hits[0].text());
    Ok(())
}

#[tokio::test]
async fn second_identical_query_is_served_from_cache_until_reindex() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let docs = larger_corpus();
    h.bootstrap().run(&docs, false).await?;
    let pipeline = h.pipeline(Reranker::disabled());

    let first = pipeline.retrieve(&RetrievalRequest::new("What is a mutual fund?")).await?;
    assert!(!first.cached);
    let second = pipeline.retrieve(&RetrievalRequest::new("  what is a MUTUAL fund? ")).await?;
    assert!(second.cached);
    assert_eq!(second.hits.iter().map(Hit::id).collect::<Vec<_>>(), first.hits.iter().map(Hit::id).collect::<Vec<_>>());

    // a different alpha is a different answer
    assert!(!pipeline.retrieve(&RetrievalRequest::new("What is a mutual fund?").alpha(0.0)).await?.cached);

    h.bootstrap().run(&docs, true).await?;
    assert!(!pipeline.retrieve(&RetrievalRequest::new("What is a mutual fund?")).await?.cached);
    Ok(())
}

#[tokio::test]
async fn rerank_reorders_and_failure_falls_back_to_fused_order() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let request = RetrievalRequest::new("mutual fund").top_k(3);

    let fused = h.pipeline(Reranker::disabled()).retrieve(&request.clone().alpha(0.4).without_rerank()).await?;
    let fused_ids: Vec<&str> = fused.hits.iter().map(Hit::id).collect();
    assert_eq!(fused_ids.len(), 3);

    let reranked = h.pipeline(Reranker::new(Arc::new(FirstLast))).retrieve(&request.clone().alpha(0.4)).await?;
    assert!(!reranked.degraded);
    let reversed: Vec<&str> = fused_ids.iter().rev().copied().collect();
    assert_eq!(reranked.hits.iter().map(Hit::id).collect::<Vec<_>>(), reversed);
    for (pos, hit) in reranked.hits.iter().enumerate() {
        let Hit::Reranked(r) = hit else { panic!("reranked variant expected") };
        assert_eq!(fused_ids[r.original_rank - 1], r.id);
        assert_eq!(r.new_rank, pos + 1);
    }

    let fallback = h.pipeline(Reranker::new(Arc::new(Down))).retrieve(&request.clone().alpha(0.6)).await?;
    assert!(fallback.degraded);
    let Hit::Reranked(top) = &fallback.hits[0] else { panic!("reranked variant expected") };
    assert_eq!(top.rerank_score, top.original_score);
    assert_eq!(top.original_rank, 1);

    let no_rerank_same_alpha = h.pipeline(Reranker::disabled()).retrieve(&request.clone().alpha(0.6).without_rerank()).await?;
    let expected: Vec<&str> = no_rerank_same_alpha.hits.iter().map(Hit::id).collect();
    assert_eq!(fallback.hits.iter().map(Hit::id).collect::<Vec<_>>(), expected);
    Ok(())
}

#[tokio::test]
async fn rerank_keeps_requested_top_k() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let pipeline = h.pipeline(Reranker::new(Arc::new(FirstLast)));

    let five = pipeline.retrieve(&RetrievalRequest::new("fund").top_k(5)).await?;
    assert!(!five.degraded);
    assert_eq!(five.hits.len(), 5);
    assert!(five.hits.iter().all(|hit| matches!(hit, Hit::Reranked(_))));

    let down = h.pipeline(Reranker::new(Arc::new(Down))).retrieve(&RetrievalRequest::new("fund").top_k(5).alpha(0.3)).await?;
    assert!(down.degraded);
    assert_eq!(down.hits.len(), 5);

    // fewer than rerank.top_k requested: the reranker still sees that many candidates
    let fused = h.pipeline(Reranker::disabled()).retrieve(&RetrievalRequest::new("fund").top_k(3).without_rerank()).await?;
    let one = pipeline.retrieve(&RetrievalRequest::new("fund").top_k(1)).await?;
    assert_eq!(one.hits.len(), 1);
    let Hit::Reranked(only) = &one.hits[0] else { panic!("reranked variant expected") };
    assert_eq!(only.original_rank, 3);
    assert_eq!(only.id, fused.hits[2].id());
    Ok(())
}

#[tokio::test]
async fn rerank_applies_to_single_retriever_modes() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let pipeline = h.pipeline(Reranker::new(Arc::new(FirstLast)));

    let plain = pipeline.retrieve(&RetrievalRequest::new("fund").mode(SearchMode::Lexical).top_k(4).without_rerank()).await?;
    assert!(plain.hits.iter().all(|hit| matches!(hit, Hit::Lexical(_))));
    let plain_ids: Vec<&str> = plain.hits.iter().map(Hit::id).collect();
    assert_eq!(plain_ids.len(), 4);

    let lexical = pipeline.retrieve(&RetrievalRequest::new("fund").mode(SearchMode::Lexical).top_k(4)).await?;
    assert!(!lexical.degraded);
    assert_eq!(lexical.hits.iter().map(Hit::id).collect::<Vec<_>>(), plain_ids.iter().rev().copied().collect::<Vec<_>>());

    let semantic = pipeline.retrieve(&RetrievalRequest::new("liquid debt").mode(SearchMode::Semantic).top_k(4)).await?;
    assert_eq!(semantic.hits.len(), 4);
    assert!(semantic.hits.iter().all(|hit| matches!(hit, Hit::Reranked(_))));
    Ok(())
}

#[tokio::test]
async fn cached_response_echoes_the_callers_query() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let pipeline = h.pipeline(Reranker::disabled());

    pipeline.retrieve(&RetrievalRequest::new("Expense Ratio")).await?;
    let second = pipeline.retrieve(&RetrievalRequest::new("  expense ratio ")).await?;
    assert!(second.cached);
    assert_eq!(second.query, "expense ratio");
    Ok(())
}

#[tokio::test]
async fn malformed_requests_fail_fast() -> anyhow::Result<()> {
    let h = Harness::new()?;
    h.bootstrap().run(&larger_corpus(), false).await?;
    let pipeline = h.pipeline(Reranker::disabled());

    for request in [RetrievalRequest::new("   "), RetrievalRequest::new("nav").top_k(0), RetrievalRequest::new("nav").alpha(2.0)] {
        let err = pipeline.retrieve(&request).await.expect_err("invalid");
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert!(!err.is_retryable());
    }
    assert_eq!("Vector".parse::<SearchMode>()?, SearchMode::Semantic);
    Ok(())
}
