//! Hybrid retrieval: BM25 + dense similarity, fused, filtered, re-ranked
//!
//! Stages, in order:
//! 1. candidate pool (whole corpus, or an MMR selection)
//! 2. BM25 scores for every pool member
//! 3. one query embedding, one distance per pool member (matched by id)
//! 4. min-max fusion, stable sort, truncate to `k_initial`
//! 5. keyword filter, falling back to its input when nothing matches
//! 6. cosine similarity threshold against stored embeddings
//! 7. relation graph contraction
//! 8. LLM re-ranking down to `top_n`
//!
//! Stages 5-8 are optional. An empty corpus yields an empty result.

use super::filters::{keyword_filter, similarity_filter};
use super::fusion::ScoreFusion;
use super::rerank::LlmReranker;
use super::{
    EmbeddingIndex, LexicalIndex, PassageRetriever, RankedResult, RetrievalDiagnostics,
    ScoredCandidate,
};
use crate::corpus::CorpusIndex;
use crate::graph::RelationGraph;
use samay_common::config::{CandidatePool, RetrievalConfig};
use samay_common::errors::{AppError, Result};
use samay_common::metrics;
use samay_common::models::PassageRecord;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Hybrid retriever over injected indexes
pub struct HybridRetriever {
    vectors: Arc<dyn EmbeddingIndex>,
    lexical: Arc<LexicalIndex>,
    graph: Option<Arc<RelationGraph>>,
    reranker: Option<LlmReranker>,
    fusion: ScoreFusion,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Create a retriever; both indexes must cover the same corpus
    pub fn new(
        vectors: Arc<dyn EmbeddingIndex>,
        lexical: Arc<LexicalIndex>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;

        if vectors.len() != lexical.doc_count() {
            return Err(AppError::IndexMismatch {
                message: format!(
                    "dense index holds {} passages, lexical index {}",
                    vectors.len(),
                    lexical.doc_count()
                ),
            });
        }

        Ok(Self {
            vectors,
            lexical,
            graph: None,
            reranker: None,
            fusion: ScoreFusion::new(config.alpha)?,
            config,
        })
    }

    /// Create a retriever over a loaded corpus
    pub fn from_corpus(corpus: &CorpusIndex, config: RetrievalConfig) -> Result<Self> {
        Self::new(corpus.vector_index(), corpus.lexical_index(), config)
    }

    /// Contract candidates through the relation graph (needs `graph_contraction`)
    pub fn with_graph(mut self, graph: Arc<RelationGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Re-rank the fused candidates with an LLM
    pub fn with_reranker(mut self, reranker: LlmReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn pool_label(&self) -> &'static str {
        match self.config.candidate_pool {
            CandidatePool::FullCorpus => "full_corpus",
            CandidatePool::Mmr { .. } => "mmr",
        }
    }

    /// Pool members and their BM25 scores, aligned by position
    fn candidate_pool<'a>(&'a self, query: &str, query_vec: &[f32]) -> (Vec<&'a PassageRecord>, Vec<f32>) {
        match self.config.candidate_pool {
            CandidatePool::FullCorpus => {
                let pool: Vec<&PassageRecord> = self.vectors.records().iter().collect();
                (pool, self.lexical.score_query(query))
            }
            CandidatePool::Mmr { k, fetch_k, lambda_mult } => {
                let pool = self
                    .vectors
                    .max_marginal_relevance_search_by_vector(query_vec, k, fetch_k, lambda_mult);
                // statistics over the pool itself, not the whole corpus
                let scores = LexicalIndex::from_records(pool.iter().copied()).score_query(query);
                (pool, scores)
            }
        }
    }

    #[instrument(skip(self), fields(pool = self.pool_label()))]
    async fn run(&self, query: &str) -> Result<RankedResult> {
        let start = Instant::now();

        if self.vectors.is_empty() {
            info!("Corpus is empty, nothing to retrieve");
            metrics::record_retrieval(start.elapsed().as_secs_f64(), self.pool_label(), 0);
            return Ok(RankedResult::empty());
        }

        let query_vec = self.vectors.embed_query(query).await?;

        // 1-2. pool and lexical scores
        let (pool, lexical_scores) = self.candidate_pool(query, &query_vec);
        let mut diagnostics = RetrievalDiagnostics {
            pool_size: pool.len(),
            ..RetrievalDiagnostics::default()
        };
        if pool.is_empty() {
            metrics::record_retrieval(start.elapsed().as_secs_f64(), self.pool_label(), 0);
            return Ok(RankedResult {
                candidates: Vec::new(),
                diagnostics,
            });
        }

        // 3. distances over the whole index, matched to pool members by id
        let distance_by_id: HashMap<&str, f32> = self
            .vectors
            .similarity_search_by_vector_with_score(&query_vec, self.vectors.len())
            .into_iter()
            .map(|(record, distance)| (record.id.as_str(), distance))
            .collect();
        let distances: Vec<f32> = pool
            .iter()
            .map(|r| distance_by_id.get(r.id.as_str()).copied().unwrap_or(f32::INFINITY))
            .collect();

        // 4. fuse and truncate
        let mut candidates: Vec<ScoredCandidate> = self
            .fusion
            .fuse(&distances, &lexical_scores)?
            .into_iter()
            .take(self.config.k_initial)
            .map(|f| ScoredCandidate {
                record: pool[f.index].clone(),
                semantic_score: f.semantic,
                lexical_score: f.lexical,
                fused_score: f.fused,
                rerank_score: None,
            })
            .collect();
        diagnostics.fused = candidates.len();

        // 5. keyword overlap
        if self.config.keyword_filter {
            let (kept, fallback) = keyword_filter(query, candidates);
            if fallback {
                debug!("No candidate shares a word with the query, keeping fused set");
            }
            candidates = kept;
            diagnostics.after_keyword_filter = Some(candidates.len());
            diagnostics.keyword_fallback = fallback;
        }

        // 6. similarity threshold
        if let Some(threshold) = self.config.similarity_threshold {
            let vectors = &self.vectors;
            candidates = similarity_filter(&query_vec, candidates, threshold, |id| vectors.embedding(id));
            diagnostics.after_similarity_threshold = Some(candidates.len());
        }

        // 7. graph contraction
        if let Some(graph) = self.graph.as_ref().filter(|_| self.config.graph_contraction) {
            candidates = graph.contract(candidates, self.config.graph_cutoff, |c| c.record.id.as_str());
            diagnostics.after_graph = Some(candidates.len());
        }

        // 8. re-ranking
        if let Some(reranker) = &self.reranker {
            candidates = reranker.rerank(query, candidates, self.config.top_n).await;
            diagnostics.reranked = true;
        }

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_retrieval(elapsed, self.pool_label(), candidates.len());
        info!(
            pool_size = diagnostics.pool_size,
            fused = diagnostics.fused,
            after_keyword_filter = ?diagnostics.after_keyword_filter,
            keyword_fallback = diagnostics.keyword_fallback,
            after_similarity_threshold = ?diagnostics.after_similarity_threshold,
            after_graph = ?diagnostics.after_graph,
            reranked = diagnostics.reranked,
            returned = candidates.len(),
            elapsed_ms = (elapsed * 1000.0) as u64,
            "Retrieval complete"
        );

        Ok(RankedResult {
            candidates,
            diagnostics,
        })
    }
}

#[async_trait::async_trait]
impl PassageRetriever for HybridRetriever {
    async fn retrieve(&self, query: &str) -> Result<RankedResult> {
        self.run(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relation;
    use crate::retrieval::test_support::{duty_corpus, embedder, record};
    use crate::retrieval::FlatVectorIndex;
    use async_trait::async_trait;
    use samay_common::config::RerankConfig;
    use samay_common::embeddings::{Embedder, HashingEmbedder};
    use samay_common::llm::MockGenerator;
    use std::time::Duration;

    async fn corpus(records: Vec<PassageRecord>) -> CorpusIndex {
        CorpusIndex::build(records, embedder()).await.unwrap()
    }

    fn fused_only(alpha: f32) -> RetrievalConfig {
        RetrievalConfig {
            alpha,
            ..RetrievalConfig::fused_only()
        }
    }

    #[tokio::test]
    async fn test_duty_scenario() {
        let corpus = corpus(duty_corpus()).await;
        let retriever = HybridRetriever::from_corpus(&corpus, fused_only(0.3)).unwrap();

        let result = retriever.retrieve("duty").await.unwrap();
        assert_eq!(result.len(), 3);

        let lexical = |id: &str| {
            result
                .candidates
                .iter()
                .find(|c| c.record.id == id)
                .map(|c| c.lexical_score)
                .unwrap()
        };
        assert!(lexical("chapter-1-verse-1") > lexical("chapter-1-verse-2"));
        assert!(lexical("chapter-1-verse-3") > lexical("chapter-1-verse-2"));
        assert_eq!(result.ids().last(), Some(&"chapter-1-verse-2"));
    }

    #[tokio::test]
    async fn test_result_never_exceeds_k_initial() {
        let corpus = corpus(duty_corpus()).await;
        for k in 1..=4 {
            let config = RetrievalConfig {
                k_initial: k,
                ..RetrievalConfig::default()
            };
            let retriever = HybridRetriever::from_corpus(&corpus, config).unwrap();
            let result = retriever.retrieve("perform duty").await.unwrap();
            assert!(result.len() <= k);
            assert!(!result.is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_empty() {
        let corpus = corpus(Vec::new()).await;
        let retriever = HybridRetriever::from_corpus(&corpus, RetrievalConfig::default()).unwrap();
        let result = retriever.retrieve("anything at all").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_filter_fallback_returns_unfiltered_set() {
        let corpus = corpus(duty_corpus()).await;

        let plain = HybridRetriever::from_corpus(&corpus, fused_only(0.3)).unwrap();
        let filtered = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                keyword_filter: true,
                ..fused_only(0.3)
            },
        )
        .unwrap();

        let expected = plain.retrieve("samadhi").await.unwrap();
        let actual = filtered.retrieve("samadhi").await.unwrap();
        assert!(actual.diagnostics.keyword_fallback);
        assert_eq!(actual.ids(), expected.ids());
    }

    #[tokio::test]
    async fn test_keyword_filter_drops_non_overlapping() {
        let corpus = corpus(duty_corpus()).await;
        let retriever = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                keyword_filter: true,
                ..fused_only(0.3)
            },
        )
        .unwrap();

        let result = retriever.retrieve("Duty").await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(!result.ids().contains(&"chapter-1-verse-2"));
    }

    #[tokio::test]
    async fn test_similarity_threshold_layered_after_fusion() {
        let corpus = corpus(duty_corpus()).await;
        let retriever = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                similarity_threshold: Some(0.99),
                ..fused_only(0.3)
            },
        )
        .unwrap();

        let result = retriever.retrieve("weather forecast tomorrow").await.unwrap();
        assert_eq!(result.ids(), vec!["chapter-1-verse-2"]);
        assert_eq!(result.diagnostics.after_similarity_threshold, Some(1));
    }

    #[tokio::test]
    async fn test_graph_contraction_drops_isolated_hits() {
        let corpus = corpus(duty_corpus()).await;
        let mut graph = RelationGraph::new();
        graph.add_edge("chapter-1-verse-1", "chapter-1-verse-3", Relation::RelatedTheme);

        let retriever = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                graph_contraction: true,
                ..fused_only(0.3)
            },
        )
        .unwrap()
        .with_graph(Arc::new(graph));

        let result = retriever.retrieve("duty").await.unwrap();
        assert_eq!(result.diagnostics.after_graph, Some(2));
        assert!(!result.ids().contains(&"chapter-1-verse-2"));
    }

    #[tokio::test]
    async fn test_graph_contraction_toggle_off_keeps_isolated_hits() {
        let corpus = corpus(duty_corpus()).await;
        let mut graph = RelationGraph::new();
        graph.add_edge("chapter-1-verse-1", "chapter-1-verse-3", Relation::RelatedTheme);

        let retriever = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                graph_contraction: false,
                ..fused_only(0.3)
            },
        )
        .unwrap()
        .with_graph(Arc::new(graph));

        let result = retriever.retrieve("duty").await.unwrap();
        assert_eq!(result.diagnostics.after_graph, None);
        assert_eq!(result.len(), 3);
        assert!(result.ids().contains(&"chapter-1-verse-2"));
    }

    #[tokio::test]
    async fn test_rerank_reorders_and_truncates() {
        let corpus = corpus(duty_corpus()).await;
        let generator = Arc::new(MockGenerator::new(|prompt| {
            Ok(if prompt.contains("weather") { "10" } else { "3" }.to_string())
        }));
        let config = RetrievalConfig {
            top_n: 2,
            ..fused_only(0.3)
        };
        let retriever = HybridRetriever::from_corpus(&corpus, config)
            .unwrap()
            .with_reranker(LlmReranker::from_config(generator.clone(), &RerankConfig::default()));

        let result = retriever.retrieve("duty").await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.ids()[0], "chapter-1-verse-2");
        assert!(result.diagnostics.reranked);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_rerank_survives_unavailable_generator() {
        let corpus = corpus(duty_corpus()).await;
        let retriever = HybridRetriever::from_corpus(&corpus, fused_only(0.3))
            .unwrap()
            .with_reranker(LlmReranker::new(
                Arc::new(MockGenerator::unavailable()),
                2,
                Duration::from_secs(1),
            ));

        let result = retriever.retrieve("duty").await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.candidates.iter().all(|c| c.rerank_score == Some(0.0)));
        assert_eq!(result.ids().last(), Some(&"chapter-1-verse-2"));
    }

    #[tokio::test]
    async fn test_mmr_pool() {
        let records = vec![
            record("chapter-2-verse-1", "steady wisdom"),
            record("chapter-2-verse-2", "steady wisdom"),
            record("chapter-2-verse-3", "steady devotion"),
            record("chapter-2-verse-4", "restless mind"),
        ];
        let corpus = corpus(records).await;
        let retriever = HybridRetriever::from_corpus(
            &corpus,
            RetrievalConfig {
                candidate_pool: CandidatePool::Mmr { k: 2, fetch_k: 4, lambda_mult: 0.5 },
                ..fused_only(0.3)
            },
        )
        .unwrap();

        let result = retriever.retrieve("steady wisdom").await.unwrap();
        assert_eq!(result.diagnostics.pool_size, 2);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_index_mismatch_rejected() {
        let corpus = corpus(duty_corpus()).await;
        let lexical = Arc::new(LexicalIndex::build(&["only one document"]));
        let err = HybridRetriever::new(corpus.vector_index(), lexical, RetrievalConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.code(), samay_common::errors::ErrorCode::IndexMismatch);
    }

    struct OfflineEmbedder;

    #[async_trait]
    impl Embedder for OfflineEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::ServiceUnavailable { message: "embedding backend down".into() })
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::ServiceUnavailable { message: "embedding backend down".into() })
        }

        fn model_name(&self) -> &str {
            "offline"
        }

        fn dimension(&self) -> usize {
            128
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_is_surfaced() {
        let records = duty_corpus();
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = HashingEmbedder::new(128).embed_batch(&texts).await.unwrap();
        let lexical = Arc::new(LexicalIndex::from_records(&records));
        let vectors = FlatVectorIndex::new(records, embeddings, Arc::new(OfflineEmbedder)).unwrap();

        let retriever =
            HybridRetriever::new(Arc::new(vectors), lexical, RetrievalConfig::default()).unwrap();
        let err = retriever.retrieve("duty").await.unwrap_err();
        assert!(err.is_service_failure());
    }

    #[tokio::test]
    async fn test_invalid_alpha_rejected() {
        let corpus = corpus(duty_corpus()).await;
        assert!(HybridRetriever::from_corpus(&corpus, fused_only(1.5)).is_err());
    }
}
