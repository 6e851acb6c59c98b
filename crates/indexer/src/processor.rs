//! Index builder
//!
//! Embeds passage texts in batches, assembles the corpus index and the
//! relation graph, and writes both snapshots.

use crate::errors::IndexerError;
use samay_common::embeddings::Embedder;
use samay_common::metrics::{self, StageTimer};
use samay_common::models::PassageRecord;
use samay_search::graph::build_relation_graph;
use samay_search::{CorpusIndex, RelationGraph};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Corpus index and relation graph built from the same records
pub struct BuiltIndex {
    pub corpus: CorpusIndex,
    pub graph: RelationGraph,
}

impl BuiltIndex {
    /// Write both snapshots
    pub fn save(
        &self,
        corpus_path: impl AsRef<Path>,
        graph_path: impl AsRef<Path>,
    ) -> Result<(), IndexerError> {
        for path in [corpus_path.as_ref(), graph_path.as_ref()] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.corpus.save(corpus_path.as_ref())?;
        self.graph.save(graph_path.as_ref())?;

        info!(
            corpus = %corpus_path.as_ref().display(),
            graph = %graph_path.as_ref().display(),
            "Snapshots written"
        );
        Ok(())
    }
}

/// Builds snapshots from passage records
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed every record and build the corpus index and relation graph
    #[instrument(skip(self, records), fields(passages = records.len(), model = %self.embedder.model_name()))]
    pub async fn build(
        &self,
        records: Vec<PassageRecord>,
        strategy: &str,
    ) -> Result<BuiltIndex, IndexerError> {
        let started = Instant::now();
        let total = records.len();
        let mut embeddings = Vec::with_capacity(total);

        let timer = StageTimer::start("embedding");
        for batch in records.chunks(self.batch_size) {
            debug!(
                batch_size = batch.len(),
                processed = embeddings.len(),
                total,
                "Embedding batch"
            );

            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            embeddings.extend(vectors);
        }
        timer.finish();

        let graph = build_relation_graph(&records);
        let corpus = CorpusIndex::new(records, embeddings, self.embedder.clone())?;

        metrics::record_indexing(started.elapsed().as_secs_f64(), corpus.len(), strategy);
        info!(
            passages = corpus.len(),
            graph_edges = graph.edge_count(),
            "Index built"
        );

        Ok(BuiltIndex { corpus, graph })
    }
}
