use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fundrag_core::error::Result;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: usize,
}

/// One scored document. `index` points into `RerankRequest::documents`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub relevance_score: f64,
}

#[async_trait]
pub trait RerankService: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `top_n` scores, best first.
    async fn rerank(&self, request: &RerankRequest) -> Result<Vec<RerankScore>>;
}
