//! SAMAY answering layer
//!
//! Turns a user question into a grounded answer:
//! - Domain flag check (is the question about the scriptures at all)
//! - Query rewriting, step-back generalisation and decomposition
//! - Hybrid retrieval through `samay-search`
//! - Prompt assembly and answer generation
//! - Retrieval hit-rate evaluation

pub mod evaluation;
pub mod flagger;
pub mod pipeline;
pub mod prompt;
pub mod rewriter;

pub use evaluation::{EvalCase, EvaluationReport, RetrievalEvaluator};
pub use flagger::{DomainFlag, DomainFlagger};
pub use pipeline::{AnswerOutcome, AnswerPipeline, GroundedAnswer};
pub use rewriter::QueryRewriter;
