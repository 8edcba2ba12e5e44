use std::path::Path;
use std::sync::Arc;

use fundrag_cache::{EmbeddingCache, QueryCache};
use fundrag_core::config::{expand_path, resolve_with_base, Settings};
use fundrag_core::loader::DocumentLoader;
use fundrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use fundrag_embed::{load_embedder, CachedEmbedder};
use fundrag_hybrid::{BootstrapReport, HybridSearcher, IndexBootstrap, IndexStateManager, Readiness, RetrievalPipeline};
use fundrag_rerank::{CohereReranker, Reranker};
use fundrag_text::LexicalIndex;
use fundrag_vector::{LanceVectorIndex, VectorStoreConfig};

/// Every long-lived component, built once and shared by handle.
pub struct App {
    loader: DocumentLoader,
    bootstrap: IndexBootstrap,
    pipeline: RetrievalPipeline,
}

impl App {
    pub fn build(settings: &Settings, base: &Path) -> anyhow::Result<Self> {
        let data_dir = resolve_with_base(base, &settings.data.data_dir);
        let loader = DocumentLoader::new(data_dir, &settings.data.faqs_file, &settings.data.funds_file);

        let raw_embedder = load_embedder(&settings.embedding);
        let embedding_cache = Arc::new(EmbeddingCache::new(
            raw_embedder.model_id(),
            settings.embedding.cache_capacity,
            settings.embedding.cache_ttl(),
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(raw_embedder, Arc::clone(&embedding_cache)));
        let query_cache = Arc::new(QueryCache::new(settings.query_cache.capacity, settings.query_cache.ttl()));

        let text: Arc<dyn TextIndexer> = Arc::new(LexicalIndex::new());
        let vector: Arc<dyn VectorIndexer> = Arc::new(LanceVectorIndex::new(VectorStoreConfig {
            uri: resolve_with_base(base, &settings.data.lancedb_dir).to_string_lossy().to_string(),
            table_name: settings.data.table_name.clone(),
            dim: embedder.dim(),
            show_progress: settings.logging.progress,
        }));
        let readiness = Arc::new(Readiness::new());

        let state = IndexStateManager::new(
            resolve_with_base(base, &settings.data.state_file),
            loader.source_paths(),
            embedder.model_id(),
            embedder.dim(),
        );
        let mut bootstrap = IndexBootstrap::new(
            Arc::clone(&text),
            Arc::clone(&vector),
            Arc::clone(&embedder),
            state,
            Arc::clone(&readiness),
        );

        let searcher = HybridSearcher::from_settings(text, vector, &settings.retrieval);
        let mut pipeline = RetrievalPipeline::new(searcher, embedder, readiness)
            .with_reranker(build_reranker(settings))
            .with_embedding_cache(embedding_cache)
            .with_settings(settings);
        if settings.query_cache.enabled {
            pipeline = pipeline.with_query_cache(Arc::clone(&query_cache));
            bootstrap = bootstrap.with_query_cache(query_cache);
        }

        Ok(Self { loader, bootstrap, pipeline })
    }

    pub async fn bootstrap(&self, force: bool) -> anyhow::Result<BootstrapReport> {
        let documents = self.loader.load_all()?;
        if documents.is_empty() {
            tracing::warn!(faqs = %self.loader.faqs_path().display(), funds = %self.loader.funds_path().display(), "no documents found");
        }
        Ok(self.bootstrap.run(&documents, force).await?)
    }

    pub fn pipeline(&self) -> &RetrievalPipeline {
        &self.pipeline
    }

    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }
}

fn build_reranker(settings: &Settings) -> Reranker {
    if !settings.rerank.enabled {
        return Reranker::disabled();
    }
    match CohereReranker::from_settings(&settings.rerank) {
        Ok(client) => {
            tracing::info!(model = %settings.rerank.model, "reranking enabled");
            Reranker::new(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "reranking disabled");
            Reranker::disabled()
        }
    }
}

/// Base directory for relative paths in the config: `APP_HOME` if set,
/// else the working directory.
pub fn base_dir() -> anyhow::Result<std::path::PathBuf> {
    match std::env::var("APP_HOME") {
        Ok(home) => Ok(expand_path(home)),
        Err(_) => Ok(std::env::current_dir()?),
    }
}
