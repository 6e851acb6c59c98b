//! Corpus index: passage records with aligned dense and lexical indexes
//!
//! Provides:
//! - Validation of the record collection (non-empty text, unique ids)
//! - Construction of both indexes from the same records, sizes checked
//! - JSON snapshots with a SHA-256 checksum over ids and texts

use crate::retrieval::{EmbeddingIndex, FlatVectorIndex, LexicalIndex};
use chrono::{DateTime, Utc};
use samay_common::embeddings::Embedder;
use samay_common::errors::{AppError, Result};
use samay_common::models::PassageRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Persisted corpus: records plus their embeddings, in corpus order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub built_at: DateTime<Utc>,

    /// Model that produced `embeddings`; queries must use the same one
    pub embedding_model: String,

    pub dimension: usize,

    /// Hex SHA-256 over record ids and texts
    pub checksum: String,

    pub records: Vec<PassageRecord>,

    pub embeddings: Vec<Vec<f32>>,
}

impl CorpusSnapshot {
    /// Checksum of the records as they are now
    pub fn compute_checksum(records: &[PassageRecord]) -> String {
        let mut hasher = Sha256::new();
        for record in records {
            hasher.update(record.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(record.text.as_bytes());
            hasher.update([b'\n']);
        }
        hex::encode(hasher.finalize())
    }

    /// Fail when the stored checksum does not match the records
    pub fn verify(&self) -> Result<()> {
        let actual = Self::compute_checksum(&self.records);
        if actual != self.checksum {
            return Err(AppError::SnapshotChecksum {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Records with a dense and a lexical index kept in 1:1 correspondence
pub struct CorpusIndex {
    vectors: Arc<FlatVectorIndex>,
    lexical: Arc<LexicalIndex>,
    embedding_model: String,
}

impl CorpusIndex {
    /// Index records with precomputed embeddings
    pub fn new(
        records: Vec<PassageRecord>,
        embeddings: Vec<Vec<f32>>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        validate_records(&records)?;

        let lexical = LexicalIndex::from_records(&records);
        let embedding_model = embedder.model_name().to_string();
        let vectors = FlatVectorIndex::new(records, embeddings, embedder)?;

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
            vectors: Arc::new(vectors),
            lexical: Arc::new(lexical),
            embedding_model,
        })
    }

    /// Embed the records and index them
    pub async fn build(records: Vec<PassageRecord>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        validate_records(&records)?;
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        Self::new(records, embeddings, embedder)
    }

    /// Restore from a snapshot after verifying checksum and embedding model
    pub fn from_snapshot(snapshot: CorpusSnapshot, embedder: Arc<dyn Embedder>) -> Result<Self> {
        snapshot.verify()?;

        if snapshot.embedding_model != embedder.model_name() {
            return Err(AppError::IndexMismatch {
                message: format!(
                    "snapshot embedded with '{}', query embedder is '{}'",
                    snapshot.embedding_model,
                    embedder.model_name()
                ),
            });
        }

        Self::new(snapshot.records, snapshot.embeddings, embedder)
    }

    pub fn to_snapshot(&self) -> CorpusSnapshot {
        let records = self.vectors.records().to_vec();
        CorpusSnapshot {
            built_at: Utc::now(),
            embedding_model: self.embedding_model.clone(),
            dimension: self.vectors.embeddings().first().map(|e| e.len()).unwrap_or(0),
            checksum: CorpusSnapshot::compute_checksum(&records),
            records,
            embeddings: self.vectors.embeddings().to_vec(),
        }
    }

    /// Load and verify a snapshot from disk
    pub fn load(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::NotFound {
            resource_type: "corpus snapshot".to_string(),
            id: format!("{} ({})", path.display(), e),
        })?;
        let snapshot: CorpusSnapshot = serde_json::from_str(&raw)?;
        let index = Self::from_snapshot(snapshot, embedder)?;

        info!(
            path = %path.display(),
            passages = index.len(),
            model = %index.embedding_model,
            "Corpus snapshot loaded"
        );
        Ok(index)
    }

    /// Write a snapshot to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(&self.to_snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[PassageRecord] {
        self.vectors.records()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Dense index as the retriever consumes it
    pub fn vector_index(&self) -> Arc<dyn EmbeddingIndex> {
        self.vectors.clone()
    }

    pub fn lexical_index(&self) -> Arc<LexicalIndex> {
        self.lexical.clone()
    }
}

fn validate_records(records: &[PassageRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.text.trim().is_empty() {
            return Err(AppError::Validation {
                message: format!("passage '{}' has empty text", record.id),
                field: Some("text".to_string()),
            });
        }
        if !seen.insert(record.id.as_str()) {
            return Err(AppError::Validation {
                message: format!("duplicate passage id '{}'", record.id),
                field: Some("id".to_string()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{duty_corpus, embedder, record};
    use samay_common::embeddings::HashingEmbedder;
    use samay_common::errors::ErrorCode;

    #[tokio::test]
    async fn test_build_keeps_indexes_aligned() {
        let index = CorpusIndex::build(duty_corpus(), embedder()).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.lexical_index().doc_count(), 3);
        assert_eq!(index.vector_index().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let mut records = duty_corpus();
        records.push(record("chapter-1-verse-4", "   "));
        let err = CorpusIndex::build(records, embedder()).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let mut records = duty_corpus();
        records.push(record("chapter-1-verse-1", "again"));
        assert!(CorpusIndex::build(records, embedder()).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_and_tamper_detection() {
        let index = CorpusIndex::build(duty_corpus(), embedder()).await.unwrap();
        let snapshot = index.to_snapshot();
        assert_eq!(snapshot.dimension, 128);

        let restored = CorpusIndex::from_snapshot(snapshot.clone(), embedder()).unwrap();
        assert_eq!(restored.records(), index.records());

        let mut tampered = snapshot;
        tampered.records[1].text = "changed".to_string();
        let err = CorpusIndex::from_snapshot(tampered, embedder()).err().unwrap();
        assert_eq!(err.code(), ErrorCode::SnapshotChecksum);
    }

    #[tokio::test]
    async fn test_embedding_model_mismatch_rejected() {
        let index = CorpusIndex::build(duty_corpus(), embedder()).await.unwrap();
        let mut snapshot = index.to_snapshot();
        snapshot.embedding_model = "text-embedding-3-small".to_string();

        let err = CorpusIndex::from_snapshot(snapshot, Arc::new(HashingEmbedder::new(128)))
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::IndexMismatch);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_valid() {
        let index = CorpusIndex::build(Vec::new(), embedder()).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.to_snapshot().dimension, 0);
    }
}
