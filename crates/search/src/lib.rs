//! SAMAY retrieval core
//!
//! Provides:
//! - Lexical (BM25) and dense (embedding) indexes over a passage corpus
//! - Min-max score fusion of the two signals
//! - Keyword, similarity and relation-graph candidate filters
//! - LLM re-ranking with bounded concurrency
//! - Corpus and graph snapshots built offline and loaded at startup

pub mod corpus;
pub mod graph;
pub mod retrieval;

pub use corpus::{CorpusIndex, CorpusSnapshot};
pub use graph::{GraphSnapshot, Relation, RelationGraph};
pub use retrieval::{
    EmbeddingIndex, FlatVectorIndex, HybridRetriever, LexicalIndex, LlmReranker,
    PassageRetriever, RankedResult, ScoreFusion, ScoredCandidate,
};
