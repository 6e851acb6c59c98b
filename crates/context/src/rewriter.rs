//! Query Rewriter - Reformulates user queries before retrieval
//!
//! Provides:
//! - Rewriting into a more specific query (no new information)
//! - Step-back generalisation for broader background retrieval
//! - Decomposition into simpler sub-queries

use samay_common::errors::Result;
use samay_common::llm::Generator;
use std::sync::Arc;
use tracing::{debug, instrument};

const ROLE: &str = "You are an AI assistant having a deep understanding of the Bhagwad Gita \
and the Patanjali Yoga Sutras";

/// LLM-backed query reformulation
pub struct QueryRewriter {
    generator: Arc<dyn Generator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn rewrite_prompt(query: &str) -> String {
        format!(
            "{ROLE} tasked with reformulating user queries to improve retrieval in a RAG system.\n\
Given the original query, rewrite it to be more specific, detailed, and likely to retrieve \
relevant information. But make sure to not add any new information that wasn't present in \
the original query.\n\n\
Original query: {query}\n\n\
Guidelines:\n\
- Just provide one rewritten query.\n\
- No explanations are needed.\n"
        )
    }

    pub fn step_back_prompt(query: &str) -> String {
        format!(
            "{ROLE} tasked with generating broader, more general queries to improve context \
retrieval in a RAG system.\n\
Given the original query, generate a step-back query that is more general and can help \
retrieve relevant background information.\n\n\
Original query: {query}\n\n\
Step-back query:"
        )
    }

    pub fn decompose_prompt(query: &str) -> String {
        format!(
            "{ROLE} tasked with breaking down complex queries into simpler sub-queries for a \
RAG system.\n\
Given the original query, decompose it into 2-4 simpler sub-queries that, when answered \
together, would provide a comprehensive response to the original query.\n\n\
Original query: {query}\n\n\
example: What are the impacts of climate change on the environment?\n\n\
Sub-queries:\n\
1. What are the impacts of climate change on biodiversity?\n\
2. How does climate change affect the oceans?\n\
3. What are the effects of climate change on agriculture?\n\
4. What are the impacts of climate change on human health?"
        )
    }

    /// One rewritten query; the original when the reply is blank
    #[instrument(skip(self))]
    pub async fn rewrite(&self, query: &str) -> Result<String> {
        let reply = self.generator.generate(&Self::rewrite_prompt(query)).await?;
        Ok(non_blank_or(reply, query))
    }

    /// A broader query for background context; the original when the reply is blank
    #[instrument(skip(self))]
    pub async fn step_back(&self, query: &str) -> Result<String> {
        let reply = self.generator.generate(&Self::step_back_prompt(query)).await?;
        Ok(non_blank_or(reply, query))
    }

    /// Sub-queries, one per non-empty reply line
    #[instrument(skip(self))]
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let reply = self.generator.generate(&Self::decompose_prompt(query)).await?;
        let sub_queries = split_sub_queries(&reply);
        debug!(count = sub_queries.len(), "Query decomposed");
        Ok(sub_queries)
    }
}

fn non_blank_or(reply: String, fallback: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        debug!("Blank reformulation, keeping the original query");
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn split_sub_queries(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Sub-queries:"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use samay_common::llm::MockGenerator;

    #[tokio::test]
    async fn test_rewrite_returns_trimmed_reply() {
        let generator = MockGenerator::constant("  What does Krishna teach about duty?\n").into_arc();
        let rewriter = QueryRewriter::new(generator.clone());

        let rewritten = rewriter.rewrite("duty?").await.unwrap();
        assert_eq!(rewritten, "What does Krishna teach about duty?");
        assert!(generator.prompts()[0].contains("Original query: duty?"));
    }

    #[tokio::test]
    async fn test_blank_rewrite_falls_back_to_original() {
        let rewriter = QueryRewriter::new(MockGenerator::constant(" \n ").into_arc());
        assert_eq!(rewriter.rewrite("what is yoga").await.unwrap(), "what is yoga");
        assert_eq!(rewriter.step_back("what is yoga").await.unwrap(), "what is yoga");
    }

    #[tokio::test]
    async fn test_decompose_drops_header_and_blank_lines() {
        let reply = "Sub-queries:\n1. What is karma?\n\n2. What is dharma?\n   \n";
        let rewriter = QueryRewriter::new(MockGenerator::constant(reply).into_arc());

        let parts = rewriter.decompose("karma and dharma").await.unwrap();
        assert_eq!(parts, vec!["1. What is karma?", "2. What is dharma?"]);
    }

    #[tokio::test]
    async fn test_generation_failure_is_surfaced() {
        let rewriter = QueryRewriter::new(MockGenerator::unavailable().into_arc());
        let err = rewriter.rewrite("q").await.unwrap_err();
        assert!(err.is_service_failure());
    }

    #[test]
    fn test_step_back_prompt_ends_with_cue() {
        assert!(QueryRewriter::step_back_prompt("q").ends_with("Step-back query:"));
    }
}
