//! Hybrid passage retrieval
//!
//! Provides:
//! - BM25 lexical scoring over the whole corpus
//! - Dense similarity and MMR search through the `EmbeddingIndex` trait
//! - Min-max fusion of both signals with a tunable `alpha`
//! - Optional keyword, similarity-threshold and graph filters
//! - Optional LLM re-ranking

mod bm25;
mod filters;
mod fusion;
mod hybrid;
mod rerank;
mod vector;

pub use bm25::LexicalIndex;
pub use filters::{cosine_similarity, keyword_filter, query_terms, similarity_filter};
pub use fusion::{FusedScore, ScoreFusion};
pub use hybrid::HybridRetriever;
pub use rerank::{parse_relevance, LlmReranker};
pub use vector::{EmbeddingIndex, FlatVectorIndex};

use samay_common::errors::Result;
use samay_common::models::PassageRecord;
use serde::{Deserialize, Serialize};

/// A passage with the scores it collected on the way through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub record: PassageRecord,

    /// Normalised similarity in [0, 1]
    pub semantic_score: f32,

    /// Normalised BM25 score in [0, 1]
    pub lexical_score: f32,

    /// `alpha * semantic + (1 - alpha) * lexical`
    pub fused_score: f32,

    /// LLM relevance (0 when the call failed), present only after re-ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// Candidate counts after each stage, for logging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDiagnostics {
    /// Passages scored
    pub pool_size: usize,

    /// Candidates kept after fusion and truncation
    pub fused: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_keyword_filter: Option<usize>,

    /// The keyword filter matched nothing and was bypassed
    #[serde(default)]
    pub keyword_fallback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_similarity_threshold: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_graph: Option<usize>,

    #[serde(default)]
    pub reranked: bool,
}

/// Ordered retrieval output; most relevant first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankedResult {
    pub candidates: Vec<ScoredCandidate>,
    pub diagnostics: RetrievalDiagnostics,
}

impl RankedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Records in rank order
    pub fn records(&self) -> impl Iterator<Item = &PassageRecord> {
        self.candidates.iter().map(|c| &c.record)
    }

    /// Passage ids in rank order
    pub fn ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.record.id.as_str()).collect()
    }
}

/// Anything that turns a query into ranked passages
#[async_trait::async_trait]
pub trait PassageRetriever: Send + Sync {
    /// Retrieve passages for the query
    async fn retrieve(&self, query: &str) -> Result<RankedResult>;
}
