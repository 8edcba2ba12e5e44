use std::hash::Hasher;

use twox_hash::XxHash64;

use fundrag_core::error::{Error, Result};
use fundrag_core::traits::Embedder;

/// Feature-hashing embedder: every lower-cased alphanumeric token is hashed
/// into one of `dim` buckets with a hash-derived sign, then the vector is
/// L2-normalised. Deterministic across runs and platforms.
pub struct HashEmbedder {
    model_id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(model_id: impl Into<String>, dim: usize) -> Self {
        Self { model_id: model_id.into(), dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Validation("cannot embed empty text".into()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
