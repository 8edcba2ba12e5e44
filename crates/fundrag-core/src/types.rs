//! Domain types shared by the lexical index, the vector index and fusion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type DocumentId = String;
pub type Metadata = BTreeMap<String, Scalar>;

/// Corpus partition a document belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Faq,
    Fund,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faq => "faq",
            Self::Fund => "fund",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "faq" => Ok(Self::Faq),
            "fund" => Ok(Self::Fund),
            other => Err(Error::Validation(format!("unknown source tag '{other}'"))),
        }
    }
}

/// A metadata value. Only scalars are allowed so the vector engine can use
/// them as equality predicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer the narrowest scalar for a raw CSV cell.
    pub fn infer(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// A unit of retrievable text handed to both indices.
///
/// - `id`: caller-assigned, unique across the corpus
/// - `text`: the payload that is tokenized and embedded
/// - `source_tag`: partition used by source filters
/// - `metadata`: scalar attributes carried through to results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub source_tag: SourceTag,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_tag: SourceTag) -> Self {
        Self { id: id.into(), text: text.into(), source_tag, metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One entry of a single-engine ranking.
///
/// `score` is engine-specific (BM25 vs cosine similarity) and must not be
/// compared across engines; only `rank` (1-based) is fusible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    pub id: DocumentId,
    pub text: String,
    pub score: f32,
    pub rank: usize,
    pub source_tag: SourceTag,
    pub metadata: Metadata,
}

/// Where a fused result was found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    LexicalOnly,
    VectorOnly,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub id: DocumentId,
    pub text: String,
    pub fused_score: f64,
    pub lexical_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub source_tag: SourceTag,
    pub metadata: Metadata,
}

impl FusedResult {
    pub fn origin(&self) -> Origin {
        match (self.lexical_rank, self.vector_rank) {
            (Some(_), Some(_)) => Origin::Both,
            (Some(_), None) => Origin::LexicalOnly,
            _ => Origin::VectorOnly,
        }
    }
}

/// A fused result after second-stage reordering. `original_rank` is the
/// 1-based position in the fused list that was sent to the reranker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankedResult {
    pub id: DocumentId,
    pub text: String,
    pub original_score: f64,
    pub rerank_score: f64,
    pub original_rank: usize,
    pub new_rank: usize,
    pub source_tag: SourceTag,
    pub metadata: Metadata,
}

/// A retrieval hit, discriminated by the stage that produced it so consumers
/// match exhaustively instead of probing for optional scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum Hit {
    Lexical(RankedResult),
    Vector(RankedResult),
    Fused(FusedResult),
    Reranked(RerankedResult),
}

impl Hit {
    pub fn id(&self) -> &str {
        match self {
            Self::Lexical(r) | Self::Vector(r) => &r.id,
            Self::Fused(r) => &r.id,
            Self::Reranked(r) => &r.id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Lexical(r) | Self::Vector(r) => &r.text,
            Self::Fused(r) => &r.text,
            Self::Reranked(r) => &r.text,
        }
    }

    pub fn source_tag(&self) -> SourceTag {
        match self {
            Self::Lexical(r) | Self::Vector(r) => r.source_tag,
            Self::Fused(r) => r.source_tag,
            Self::Reranked(r) => r.source_tag,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Lexical(r) | Self::Vector(r) => &r.metadata,
            Self::Fused(r) => &r.metadata,
            Self::Reranked(r) => &r.metadata,
        }
    }

    /// The score the producing stage ranked by.
    pub fn score(&self) -> f64 {
        match self {
            Self::Lexical(r) | Self::Vector(r) => f64::from(r.score),
            Self::Fused(r) => r.fused_score,
            Self::Reranked(r) => r.rerank_score,
        }
    }

    pub fn to_context(&self) -> ContextBlock {
        ContextBlock {
            text: self.text().to_string(),
            source_tag: self.source_tag(),
            metadata: self.metadata().clone(),
        }
    }
}

/// What the generation stage receives for prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextBlock {
    pub text: String,
    pub source_tag: SourceTag,
    pub metadata: Metadata,
}
