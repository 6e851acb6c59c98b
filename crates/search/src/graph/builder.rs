//! Offline construction of the relation graph from a corpus snapshot

use super::{Relation, RelationGraph};
use samay_common::models::PassageRecord;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Build the relation graph for records in corpus order.
///
/// - `next`: each record to the following record when both share source and chapter
/// - `related_theme`: any two distinct passages with at least one translation in common
///
/// `next` edges are added first, so a consecutive pair that also shares a
/// translation stays labelled `next`. Shared translations are found through
/// an inverted index rather than comparing every pair.
pub fn build_relation_graph(records: &[PassageRecord]) -> RelationGraph {
    let mut graph = RelationGraph::new();

    for pair in records.windows(2) {
        let (current, following) = (&pair[0], &pair[1]);
        if current.metadata.chapter == following.metadata.chapter
            && current.metadata.source == following.metadata.source
        {
            graph.add_edge(&current.id, &following.id, Relation::Next);
        }
    }
    let next_edges = graph.edge_count();

    let mut by_translation: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        for value in record.metadata.translations.values() {
            let holders = by_translation.entry(value).or_default();
            if holders.last() != Some(&i) {
                holders.push(i);
            }
        }
    }

    for (i, record) in records.iter().enumerate() {
        let partners: BTreeSet<usize> = record
            .metadata
            .translations
            .values()
            .into_iter()
            .filter_map(|value| by_translation.get(value))
            .flatten()
            .copied()
            .filter(|&j| j > i)
            .collect();

        for j in partners {
            graph.add_edge(&record.id, &records[j].id, Relation::RelatedTheme);
        }
    }

    info!(
        nodes = graph.node_count(),
        next_edges,
        related_theme_edges = graph.edge_count() - next_edges,
        "Relation graph built"
    );

    graph
}
