#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use fundrag_core::error::{Error, Result};
use fundrag_core::traits::VectorIndexer;
use fundrag_core::types::{Document, RankedResult, SourceTag};

/// Brute-force cosine index that can be told to fail or stall.
#[derive(Default)]
pub struct MemoryVectorIndex {
    rows: Mutex<Vec<(Document, Vec<f32>)>>,
    pub down: AtomicBool,
    pub index_calls: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("lock") = Some(delay);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::unavailable("vector store", "stub is down"));
        }
        Ok(())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorIndexer for MemoryVectorIndex {
    async fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        self.check()?;
        if documents.len() != embeddings.len() {
            return Err(Error::DimensionMismatch { documents: documents.len(), embeddings: embeddings.len() });
        }
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("lock");
        for (d, e) in documents.iter().zip(embeddings) {
            rows.retain(|(existing, _)| existing.id != d.id);
            rows.push((d.clone(), e.clone()));
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
        self.check()?;
        let delay = *self.delay.lock().expect("lock");
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let mut scored: Vec<(f32, Document)> = self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|(d, _)| source_filter.map_or(true, |f| f == d.source_tag))
            .map(|(d, e)| (cosine(query_vector, e), d.clone()))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (score, d))| RankedResult { id: d.id, text: d.text, score, rank: i + 1, source_tag: d.source_tag, metadata: d.metadata })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.check()?;
        self.rows.lock().expect("lock").clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.check()?;
        Ok(self.rows.lock().expect("lock").len())
    }
}

pub fn scenario_corpus() -> Vec<Document> {
    vec![
        Document::new("faq_0", "What is a mutual fund?", SourceTag::Faq).with_meta("category", "basics"),
        Document::new("fund_0", "Alpha Growth Fund invests in large cap equity", SourceTag::Fund).with_meta("fund_name", "Alpha Growth Fund"),
    ]
}

pub fn larger_corpus() -> Vec<Document> {
    vec![
        Document::new("faq_0", "What is a mutual fund?", SourceTag::Faq),
        Document::new("faq_1", "How do I redeem mutual fund units?", SourceTag::Faq),
        Document::new("faq_2", "What is the expense ratio of a fund?", SourceTag::Faq),
        Document::new("faq_3", "Can I start a SIP online?", SourceTag::Faq),
        Document::new("fund_0", "Alpha Growth Fund large cap equity", SourceTag::Fund),
        Document::new("fund_1", "Beta Liquid Fund overnight debt", SourceTag::Fund),
        Document::new("fund_2", "Gamma Tax Saver ELSS equity fund with lock in", SourceTag::Fund),
    ]
}
