//! Dense vector search over passage embeddings
//!
//! `EmbeddingIndex` is the capability the retriever consumes; any vector
//! store can implement it. `FlatVectorIndex` is the in-memory exact
//! implementation: squared L2 distance over every stored vector, smaller
//! is closer, ties broken by corpus position.

use super::filters::cosine_similarity;
use async_trait::async_trait;
use samay_common::embeddings::Embedder;
use samay_common::errors::{AppError, Result};
use samay_common::models::PassageRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// Nearest-neighbour search over a fixed corpus of passage records
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Embed free text with the model the index was built with
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Every record, in corpus order
    fn records(&self) -> &[PassageRecord];

    /// Stored vector for a passage id
    fn embedding(&self, id: &str) -> Option<&[f32]>;

    /// Up to `k` (record, distance) pairs by ascending distance
    fn similarity_search_by_vector_with_score(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Vec<(&PassageRecord, f32)>;

    /// Max-marginal-relevance selection for a precomputed query vector
    fn max_marginal_relevance_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Vec<&PassageRecord>;

    fn len(&self) -> usize {
        self.records().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn similarity_search_by_vector(&self, vector: &[f32], k: usize) -> Vec<&PassageRecord> {
        self.similarity_search_by_vector_with_score(vector, k)
            .into_iter()
            .map(|(record, _)| record)
            .collect()
    }

    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(PassageRecord, f32)>> {
        let vector = self.embed_query(query).await?;
        Ok(self
            .similarity_search_by_vector_with_score(&vector, k)
            .into_iter()
            .map(|(record, distance)| (record.clone(), distance))
            .collect())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<PassageRecord>> {
        let vector = self.embed_query(query).await?;
        Ok(self
            .similarity_search_by_vector(&vector, k)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<PassageRecord>> {
        let vector = self.embed_query(query).await?;
        Ok(self
            .max_marginal_relevance_search_by_vector(&vector, k, fetch_k, lambda_mult)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Exact in-memory vector index
pub struct FlatVectorIndex {
    records: Vec<PassageRecord>,
    embeddings: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
    embedder: Arc<dyn Embedder>,
}

impl FlatVectorIndex {
    /// Wrap precomputed embeddings; `embeddings[i]` belongs to `records[i]`
    pub fn new(
        records: Vec<PassageRecord>,
        embeddings: Vec<Vec<f32>>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if records.len() != embeddings.len() {
            return Err(AppError::IndexMismatch {
                message: format!(
                    "{} records but {} embeddings",
                    records.len(),
                    embeddings.len()
                ),
            });
        }

        let dimension = embedder.dimension();
        if let Some((i, bad)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != dimension)
        {
            return Err(AppError::IndexMismatch {
                message: format!(
                    "embedding for '{}' has dimension {}, embedder produces {}",
                    records[i].id,
                    bad.len(),
                    dimension
                ),
            });
        }

        let mut positions = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if positions.insert(record.id.clone(), i).is_some() {
                return Err(AppError::Validation {
                    message: format!("duplicate passage id '{}'", record.id),
                    field: Some("id".to_string()),
                });
            }
        }

        Ok(Self {
            records,
            embeddings,
            positions,
            embedder,
        })
    }

    /// Embed every record's text and index the result
    pub async fn build(records: Vec<PassageRecord>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        Self::new(records, embeddings, embedder)
    }

    /// Stored vectors in corpus order
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Positions of the `k` nearest vectors, ascending distance
    fn nearest(&self, vector: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, squared_l2(vector, e)))
            .collect();

        // stable: equal distances keep corpus order
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl EmbeddingIndex for FlatVectorIndex {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    fn records(&self) -> &[PassageRecord] {
        &self.records
    }

    fn embedding(&self, id: &str) -> Option<&[f32]> {
        self.positions
            .get(id)
            .map(|&i| self.embeddings[i].as_slice())
    }

    fn similarity_search_by_vector_with_score(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Vec<(&PassageRecord, f32)> {
        self.nearest(vector, k)
            .into_iter()
            .map(|(i, distance)| (&self.records[i], distance))
            .collect()
    }

    fn max_marginal_relevance_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Vec<&PassageRecord> {
        let fetched: Vec<usize> = self
            .nearest(vector, fetch_k)
            .into_iter()
            .map(|(i, _)| i)
            .collect();

        let target = k.min(fetched.len());
        if target == 0 {
            return Vec::new();
        }

        let to_query: Vec<f32> = fetched
            .iter()
            .map(|&i| cosine_similarity(vector, &self.embeddings[i]))
            .collect();

        // seed with the candidate closest to the query
        let mut best = 0;
        for (j, score) in to_query.iter().enumerate() {
            if *score > to_query[best] {
                best = j;
            }
        }
        let mut selected = vec![best];

        while selected.len() < target {
            let mut best_score = f32::NEG_INFINITY;
            let mut pick = None;

            for (j, query_score) in to_query.iter().enumerate() {
                if selected.contains(&j) {
                    continue;
                }
                let redundancy = selected
                    .iter()
                    .map(|&s| {
                        cosine_similarity(
                            &self.embeddings[fetched[j]],
                            &self.embeddings[fetched[s]],
                        )
                    })
                    .fold(f32::NEG_INFINITY, f32::max);
                let score = lambda_mult * query_score - (1.0 - lambda_mult) * redundancy;
                if score > best_score || pick.is_none() {
                    best_score = score;
                    pick = Some(j);
                }
            }

            match pick {
                Some(j) => selected.push(j),
                None => break,
            }
        }

        selected
            .into_iter()
            .map(|j| &self.records[fetched[j]])
            .collect()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{duty_corpus, embedder, record};
    use samay_common::embeddings::HashingEmbedder;

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let index = FlatVectorIndex::build(duty_corpus(), embedder()).await.unwrap();
        let hits = index
            .similarity_search_with_score("weather forecast tomorrow", 3)
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.id, "chapter-1-verse-2");
        assert!(hits[0].1 <= hits[1].1 && hits[1].1 <= hits[2].1);
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus_returns_everything() {
        let index = FlatVectorIndex::build(duty_corpus(), embedder()).await.unwrap();
        let hits = index.similarity_search("duty", 100).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_search_is_deterministic() {
        let index = FlatVectorIndex::build(duty_corpus(), embedder()).await.unwrap();
        let a = index.similarity_search_with_score("your duty", 3).await.unwrap();
        let b = index.similarity_search_with_score("your duty", 3).await.unwrap();
        let ids = |v: &[(PassageRecord, f32)]| v.iter().map(|(r, _)| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let err = FlatVectorIndex::new(duty_corpus(), vec![vec![0.0; 128]], embedder())
            .err()
            .unwrap();
        assert_eq!(err.code(), samay_common::errors::ErrorCode::IndexMismatch);
    }

    #[tokio::test]
    async fn test_mmr_prefers_diverse_results() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(256));
        let records = vec![
            record("chapter-2-verse-1", "steady wisdom steady mind"),
            record("chapter-2-verse-2", "steady wisdom steady mind"),
            record("chapter-2-verse-3", "steady wisdom and devotion"),
        ];
        let index = FlatVectorIndex::build(records, embedder).await.unwrap();

        // pure relevance keeps the duplicate, pure diversity skips it
        let relevant = index
            .max_marginal_relevance_search("steady wisdom steady mind", 2, 3, 1.0)
            .await
            .unwrap();
        assert_eq!(relevant[0].id, "chapter-2-verse-1");
        assert_eq!(relevant[1].id, "chapter-2-verse-2");

        let diverse = index
            .max_marginal_relevance_search("steady wisdom steady mind", 2, 3, 0.0)
            .await
            .unwrap();
        assert_eq!(diverse[0].id, "chapter-2-verse-1");
        assert_eq!(diverse[1].id, "chapter-2-verse-3");
    }

    #[tokio::test]
    async fn test_embedding_lookup_by_id() {
        let index = FlatVectorIndex::build(duty_corpus(), embedder()).await.unwrap();
        assert_eq!(index.embedding("chapter-1-verse-3").map(|e| e.len()), Some(128));
        assert!(index.embedding("chapter-9-verse-9").is_none());
    }
}
