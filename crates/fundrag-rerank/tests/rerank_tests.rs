use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fundrag_core::error::{Error, Result};
use fundrag_core::types::{FusedResult, Metadata, SourceTag};
use fundrag_rerank::{CohereReranker, RerankRequest, RerankScore, RerankService, Reranker};

fn fused(n: usize) -> Vec<FusedResult> {
    (0..n)
        .map(|i| FusedResult {
            id: format!("doc_{i}"),
            text: format!("text {i}"),
            fused_score: 1.0 / (61.0 + i as f64),
            lexical_rank: Some(i + 1),
            vector_rank: None,
            source_tag: SourceTag::Faq,
            metadata: Metadata::new(),
        })
        .collect()
}

/// Scores documents in reverse order of how they were sent.
struct ReversingService;

#[async_trait]
impl RerankService for ReversingService {
    fn name(&self) -> &str { "reverse" }
    async fn rerank(&self, request: &RerankRequest) -> Result<Vec<RerankScore>> {
        Ok((0..request.documents.len()).rev().take(request.top_n).enumerate().map(|(pos, index)| RerankScore { index, relevance_score: 1.0 - pos as f64 * 0.1 }).collect())
    }
}

struct BrokenService(Vec<RerankScore>);

#[async_trait]
impl RerankService for BrokenService {
    fn name(&self) -> &str { "broken" }
    async fn rerank(&self, _request: &RerankRequest) -> Result<Vec<RerankScore>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn service_order_is_applied_and_ranks_recorded() {
    let reranker = Reranker::new(Arc::new(ReversingService));
    let out = reranker.rerank("q", &fused(4), 2).await;

    assert_eq!(out.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["doc_3", "doc_2"]);
    assert_eq!(out[0].original_rank, 4);
    assert_eq!(out[0].new_rank, 1);
    assert_eq!(out[1].new_rank, 2);
    assert!((out[0].rerank_score - 1.0).abs() < 1e-9);
    assert!((out[0].original_score - 1.0 / 64.0).abs() < 1e-12);
}

#[tokio::test]
async fn out_of_range_index_falls_back_to_fused_order() {
    let reranker = Reranker::new(Arc::new(BrokenService(vec![RerankScore { index: 9, relevance_score: 0.9 }])));
    let input = fused(3);

    assert!(reranker.try_rerank("q", &input, 2).await.is_err());
    let out = reranker.rerank("q", &input, 2).await;
    assert_eq!(out.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["doc_0", "doc_1"]);
    assert!(out.iter().all(|r| r.rerank_score == r.original_score && r.original_rank == r.new_rank));
}

#[tokio::test]
async fn unreachable_endpoint_is_not_a_caller_error() {
    // bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = CohereReranker::new(format!("http://{addr}/v1/rerank"), "rerank-english-v3.0", Some("key".into()), Duration::from_secs(2)).expect("client");
    let reranker = Reranker::new(Arc::new(client));
    let input = fused(5);

    let err = reranker.try_rerank("q", &input, 3).await.expect_err("connection refused");
    assert!(matches!(err, Error::ServiceUnavailable { .. }));

    let out = reranker.rerank("q", &input, 3).await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].id, "doc_0");
}

#[tokio::test]
async fn missing_api_key_is_a_config_error_and_disabled_reranker_falls_back() {
    let err = CohereReranker::new("http://127.0.0.1:1/rerank", "m", None, Duration::from_millis(100)).err();
    assert!(matches!(err, Some(Error::InvalidConfig(_))));
    let err = CohereReranker::new("http://127.0.0.1:1/rerank", "m", Some("  ".into()), Duration::from_millis(100)).err();
    assert!(matches!(err, Some(Error::InvalidConfig(_))));

    let disabled = Reranker::disabled();
    assert!(!disabled.is_enabled());
    assert_eq!(disabled.rerank("q", &fused(4), 3).await.len(), 3);
    assert!(disabled.rerank("q", &[], 3).await.is_empty());
}

/// Serves one canned HTTP response and returns the raw request it received.
async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/v1/rerank", listener.local_addr().expect("addr"));
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 64 * 1024];
        let mut request = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.expect("read");
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0)))
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length { break; }
            }
            if n == 0 { break; }
        }
        let response = format!("HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}", body.len(), body);
        socket.write_all(response.as_bytes()).await.expect("write");
        String::from_utf8_lossy(&request).to_string()
    });
    (url, handle)
}

#[tokio::test]
async fn http_contract_round_trip() {
    let (url, server) = serve_once(r#"{"id":"x","results":[{"index":2,"relevance_score":0.91},{"index":0,"relevance_score":0.42}]}"#).await;
    let client = CohereReranker::new(url, "rerank-english-v3.0", Some("secret".into()), Duration::from_secs(5)).expect("client");

    let out = Reranker::new(Arc::new(client)).try_rerank("what is nav", &fused(3), 2).await.expect("rerank");
    assert_eq!(out.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["doc_2", "doc_0"]);
    assert_eq!(out[0].original_rank, 3);
    assert!((out[1].rerank_score - 0.42).abs() < 1e-9);

    let request = server.await.expect("server");
    assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    let body = &request[request.find("\r\n\r\n").expect("body") + 4..];
    let json: serde_json::Value = serde_json::from_str(body).expect("json body");
    assert_eq!(json["query"], "what is nav");
    assert_eq!(json["top_n"], 2);
    assert_eq!(json["documents"].as_array().map(|a| a.len()), Some(3));
}
