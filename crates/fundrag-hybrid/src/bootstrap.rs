use std::sync::Arc;

use serde::Serialize;

use fundrag_cache::QueryCache;
use fundrag_core::error::{Error, Result};
use fundrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use fundrag_core::types::Document;

use crate::readiness::Readiness;
use crate::state::{IndexState, IndexStateManager, RebuildDecision};

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub decision: RebuildDecision,
    pub forced: bool,
    pub rebuilt: bool,
    pub fingerprint: String,
    pub lexical_documents: usize,
    pub vector_documents: usize,
    pub vector_ready: bool,
    /// Why the vector stage failed, when it did.
    pub vector_error: Option<String>,
}

/// Brings both indices up at process start.
///
/// The keyword index is rebuilt every time. The vector index is rebuilt
/// only when the persisted state says it is missing, stale or built by a
/// different embedder. A vector-stage failure leaves the keyword index
/// serving and is reported, not returned.
pub struct IndexBootstrap {
    text: Arc<dyn TextIndexer>,
    vector: Arc<dyn VectorIndexer>,
    embedder: Arc<dyn Embedder>,
    state: IndexStateManager,
    readiness: Arc<Readiness>,
    query_cache: Option<Arc<QueryCache>>,
}

impl IndexBootstrap {
    pub fn new(
        text: Arc<dyn TextIndexer>,
        vector: Arc<dyn VectorIndexer>,
        embedder: Arc<dyn Embedder>,
        state: IndexStateManager,
        readiness: Arc<Readiness>,
    ) -> Self {
        Self { text, vector, embedder, state, readiness, query_cache: None }
    }

    /// Responses cached before a rebuild are dropped after it.
    pub fn with_query_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.query_cache = Some(cache);
        self
    }

    pub fn state(&self) -> &IndexStateManager {
        &self.state
    }

    pub async fn run(&self, documents: &[Document], force: bool) -> Result<BootstrapReport> {
        if let Err(e) = self.text.index(documents) {
            self.readiness.set_lexical(false);
            return Err(e);
        }
        self.readiness.set_lexical(true);

        let fingerprint = self.state.current_fingerprint()?;
        let read = self.state.read_state();
        let vector_count = match self.vector.count().await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(error = %e, "vector index count unavailable");
                None
            }
        };
        let decision = self.state.decide(&read, &fingerprint, vector_count);
        let rebuild = force || decision.should_rebuild();
        tracing::info!(decision = ?decision, force, rebuild, documents = documents.len(), "index bootstrap");

        let mut report = BootstrapReport {
            decision,
            forced: force,
            rebuilt: false,
            fingerprint: fingerprint.clone(),
            lexical_documents: self.text.count(),
            vector_documents: vector_count.unwrap_or(0),
            vector_ready: false,
            vector_error: None,
        };

        if !rebuild {
            self.readiness.set_vector(true);
            report.vector_ready = true;
            return Ok(report);
        }

        match self.rebuild_vector(documents).await {
            Ok(indexed) => {
                report.rebuilt = true;
                report.vector_documents = indexed;
                report.vector_ready = true;
                self.readiness.set_vector(true);
                let state = IndexState::new(fingerprint, documents.len(), self.embedder.model_id());
                if let Err(e) = self.state.persist(&state) {
                    // the index is usable; the next start just rebuilds again
                    tracing::warn!(error = %e, "could not persist index state");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "vector index build failed; serving keyword search only");
                self.readiness.set_vector(false);
                report.vector_error = Some(e.to_string());
            }
        }

        if let Some(cache) = &self.query_cache {
            cache.clear();
            tracing::debug!("query cache cleared after reindex");
        }
        Ok(report)
    }

    async fn rebuild_vector(&self, documents: &[Document]) -> Result<usize> {
        self.vector.clear().await?;
        if documents.is_empty() {
            return Ok(0);
        }

        let embedder = Arc::clone(&self.embedder);
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::Operation(format!("embedding task failed: {e}")))??;

        self.vector.index(documents, &embeddings).await?;
        self.vector.count().await
    }
}
