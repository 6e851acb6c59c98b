//! LLM re-ranking
//!
//! Each candidate is scored by an independent generation call asking for a
//! 1-10 relevance rating. Calls run with bounded concurrency and a per-call
//! timeout. A call that fails, times out or returns something that is not a
//! finite number scores 0; it never aborts the batch.

use super::ScoredCandidate;
use futures::stream::{self, StreamExt};
use samay_common::config::RerankConfig;
use samay_common::llm::Generator;
use samay_common::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Scores candidates through a `Generator`
pub struct LlmReranker {
    generator: Arc<dyn Generator>,
    concurrency: usize,
    timeout: Duration,
}

impl LlmReranker {
    pub fn new(generator: Arc<dyn Generator>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub fn from_config(generator: Arc<dyn Generator>, config: &RerankConfig) -> Self {
        Self::new(
            generator,
            config.concurrency,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Relevance prompt for one candidate
    pub fn prompt(query: &str, document: &str) -> String {
        format!(
            "On a scale of 1-10, rate the relevance of the following document to the query. \
Consider the specific context and intent of the query, not just keyword matches.\n\
Query: {query}\n\
Document: {document}\n\n\
Please provide only a number between 1 and 10 as the relevance score. \
Do not include any explanations or additional text.\n\
Relevance Score:"
        )
    }

    async fn score_one(&self, query: &str, candidate: &ScoredCandidate) -> f32 {
        let prompt = Self::prompt(query, &candidate.record.text);
        let id = candidate.record.id.as_str();

        match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(reply)) => match parse_relevance(&reply) {
                Some(score) => {
                    debug!(passage_id = id, score, "Candidate scored");
                    score
                }
                None => {
                    warn!(passage_id = id, reply = %reply.trim(), "Unparseable relevance score, using 0");
                    metrics::record_rerank_failure("parse");
                    0.0
                }
            },
            Ok(Err(e)) => {
                warn!(passage_id = id, error = %e, "Relevance scoring failed, using 0");
                metrics::record_rerank_failure("generation");
                0.0
            }
            Err(_) => {
                warn!(
                    passage_id = id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Relevance scoring timed out, using 0"
                );
                metrics::record_rerank_failure("timeout");
                0.0
            }
        }
    }

    /// Score every candidate, sort by score descending (stable) and keep `top_n`
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate>,
        top_n: usize,
    ) -> Vec<ScoredCandidate> {
        let calls: Vec<_> = candidates
            .iter()
            .map(|candidate| self.score_one(query, candidate))
            .collect();
        let scores: Vec<f32> = stream::iter(calls)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut candidate, score)| {
                candidate.rerank_score = Some(score);
                candidate
            })
            .collect();

        scored.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(0.0);
            let b = b.rerank_score.unwrap_or(0.0);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_n);
        scored
    }
}

/// Parse a relevance reply; `None` unless the trimmed reply is a finite number
pub fn parse_relevance(reply: &str) -> Option<f32> {
    reply
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|score| score.is_finite())
}
