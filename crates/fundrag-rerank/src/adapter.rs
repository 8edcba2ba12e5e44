use std::collections::HashSet;
use std::sync::Arc;

use fundrag_core::error::{Error, Result};
use fundrag_core::types::{FusedResult, RerankedResult};

use crate::traits::{RerankRequest, RerankService};

/// Reorders fused results with an optional external service.
///
/// `try_rerank` reports failures; `rerank` never does, falling back to the
/// first `top_k` fused results in their original order.
#[derive(Clone, Default)]
pub struct Reranker {
    service: Option<Arc<dyn RerankService>>,
}

impl Reranker {
    pub fn new(service: Arc<dyn RerankService>) -> Self {
        Self { service: Some(service) }
    }

    pub fn disabled() -> Self {
        Self { service: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    pub async fn try_rerank(&self, query: &str, results: &[FusedResult], top_k: usize) -> Result<Vec<RerankedResult>> {
        if results.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }
        let Some(service) = &self.service else {
            return Err(Error::unavailable("reranker", "no rerank service configured"));
        };

        let top_n = top_k.min(results.len());
        let request = RerankRequest {
            query: query.to_string(),
            documents: results.iter().map(|r| r.text.clone()).collect(),
            top_n,
        };
        let scores = service.rerank(&request).await?;

        let mut seen = HashSet::with_capacity(top_n);
        let mut reranked = Vec::with_capacity(top_n);
        for (pos, s) in scores.into_iter().take(top_n).enumerate() {
            let Some(original) = results.get(s.index) else {
                return Err(Error::unavailable("reranker", format!("index {} out of range for {} documents", s.index, results.len())));
            };
            if !seen.insert(s.index) {
                return Err(Error::unavailable("reranker", format!("index {} returned twice", s.index)));
            }
            reranked.push(RerankedResult {
                id: original.id.clone(),
                text: original.text.clone(),
                original_score: original.fused_score,
                rerank_score: s.relevance_score,
                original_rank: s.index + 1,
                new_rank: pos + 1,
                source_tag: original.source_tag,
                metadata: original.metadata.clone(),
            });
        }
        Ok(reranked)
    }

    pub async fn rerank(&self, query: &str, results: &[FusedResult], top_k: usize) -> Vec<RerankedResult> {
        match self.try_rerank(query, results, top_k).await {
            Ok(reranked) => reranked,
            Err(e) => {
                tracing::warn!(error = %e, "reranking failed, keeping fused order");
                fallback(results, top_k)
            }
        }
    }
}

/// The first `top_k` fused results, unchanged, scored by their fused score.
pub fn fallback(results: &[FusedResult], top_k: usize) -> Vec<RerankedResult> {
    results
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(i, r)| RerankedResult {
            id: r.id.clone(),
            text: r.text.clone(),
            original_score: r.fused_score,
            rerank_score: r.fused_score,
            original_rank: i + 1,
            new_rank: i + 1,
            source_tag: r.source_tag,
            metadata: r.metadata.clone(),
        })
        .collect()
}
