use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fundrag_core::config::RerankSettings;
use fundrag_core::error::{Error, Result};

use crate::traits::{RerankRequest, RerankScore, RerankService};

const SERVICE: &str = "reranker";

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    results: Vec<RerankScore>,
}

/// Client for a Cohere-compatible `/rerank` endpoint.
pub struct CohereReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl CohereReranker {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig("rerank.api_key is required when reranking is enabled".into()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("rerank HTTP client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.into(), model: model.into(), api_key })
    }

    /// Falls back to `COHERE_API_KEY` when the config carries no key.
    pub fn from_settings(settings: &RerankSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().or_else(|| std::env::var("COHERE_API_KEY").ok());
        Self::new(&settings.endpoint, &settings.model, api_key, Duration::from_millis(settings.timeout_ms))
    }
}

#[async_trait]
impl RerankService for CohereReranker {
    fn name(&self) -> &str {
        &self.model
    }

    async fn rerank(&self, request: &RerankRequest) -> Result<Vec<RerankScore>> {
        let body = WireRequest {
            model: &self.model,
            query: &request.query,
            documents: &request.documents,
            top_n: request.top_n,
            return_documents: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unavailable(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::unavailable(SERVICE, format!("HTTP {status}: {detail}")));
        }
        let parsed: WireResponse = response.json().await.map_err(|e| Error::unavailable(SERVICE, format!("malformed response: {e}")))?;
        tracing::debug!(returned = parsed.results.len(), top_n = request.top_n, "rerank response");
        Ok(parsed.results)
    }
}
