use std::collections::HashMap;

use fundrag_core::error::{Error, Result};
use fundrag_core::types::{FusedResult, RankedResult};

pub const DEFAULT_RRF_K: f64 = 60.0;

pub fn validate_alpha(alpha: f64) -> Result<()> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(Error::Validation(format!("alpha must be within [0, 1], got {alpha}")))
    }
}

fn term(weight: f64, k_rrf: f64, rank: Option<usize>) -> f64 {
    rank.map_or(0.0, |r| weight / (k_rrf + r as f64))
}

/// Weighted Reciprocal Rank Fusion of a keyword and a vector ranking.
///
/// Ranks are 1-based positions in the given slices. A document seen by both
/// engines keeps the lexical copy of its text and metadata. Candidates with a
/// zero fused score (possible only at `alpha` 0 or 1) are dropped, so the
/// extremes reproduce the corresponding single-engine order exactly. Equal
/// scores keep first-seen order: lexical list first, then vector.
pub fn rrf_fuse(lexical: &[RankedResult], vector: &[RankedResult], alpha: f64, k_rrf: f64, top_k: usize) -> Result<Vec<FusedResult>> {
    validate_alpha(alpha)?;
    if !(k_rrf.is_finite() && k_rrf > 0.0) {
        return Err(Error::Validation(format!("rrf k must be positive, got {k_rrf}")));
    }
    if top_k == 0 {
        return Ok(vec![]);
    }

    let mut fused: Vec<FusedResult> = Vec::with_capacity(lexical.len() + vector.len());
    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(lexical.len() + vector.len());

    for (pos, r) in lexical.iter().enumerate() {
        if by_id.contains_key(r.id.as_str()) {
            continue;
        }
        by_id.insert(&r.id, fused.len());
        fused.push(FusedResult {
            id: r.id.clone(),
            text: r.text.clone(),
            fused_score: 0.0,
            lexical_rank: Some(pos + 1),
            vector_rank: None,
            source_tag: r.source_tag,
            metadata: r.metadata.clone(),
        });
    }
    for (pos, r) in vector.iter().enumerate() {
        match by_id.get(r.id.as_str()) {
            Some(&slot) => {
                let existing = &mut fused[slot];
                if existing.vector_rank.is_none() {
                    existing.vector_rank = Some(pos + 1);
                }
            }
            None => {
                by_id.insert(&r.id, fused.len());
                fused.push(FusedResult {
                    id: r.id.clone(),
                    text: r.text.clone(),
                    fused_score: 0.0,
                    lexical_rank: None,
                    vector_rank: Some(pos + 1),
                    source_tag: r.source_tag,
                    metadata: r.metadata.clone(),
                });
            }
        }
    }

    for f in &mut fused {
        f.fused_score = term(1.0 - alpha, k_rrf, f.lexical_rank) + term(alpha, k_rrf, f.vector_rank);
    }
    fused.retain(|f| f.fused_score > 0.0);
    // stable: ties keep first-seen order
    fused.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
    fused.truncate(top_k);

    tracing::debug!(lexical = lexical.len(), vector = vector.len(), fused = fused.len(), alpha, "rrf fusion");
    Ok(fused)
}
