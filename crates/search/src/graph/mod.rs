//! Relation graph over passage ids
//!
//! Provides:
//! - Undirected labelled graph (`next`, `related_theme`) keyed by passage id
//! - Hop-bounded neighbourhoods by breadth-first search
//! - Candidate contraction: keep only candidates reachable from the others
//! - JSON snapshot for offline build / startup load
//!
//! Nodes exist only through edges, so a passage with no relation to any
//! other is not part of the graph and never survives contraction.

mod builder;

pub use builder::build_relation_graph;

use chrono::{DateTime, Utc};
use samay_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Consecutive verses of one chapter
    Next,
    /// Passages sharing a translation
    RelatedTheme,
}

/// Edge in the relation graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
}

/// In-memory relation graph
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    /// Adjacency list: passage id -> neighbouring ids
    adjacency: HashMap<String, Vec<String>>,

    /// Edges in insertion order
    edges: Vec<GraphEdge>,

    /// Unordered endpoint pairs already linked
    linked: HashSet<(String, String)>,
}

impl RelationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Add an undirected edge.
    ///
    /// Self-loops are ignored; an existing edge keeps its first label.
    /// Returns whether a new edge was added.
    pub fn add_edge(&mut self, a: &str, b: &str, relation: Relation) -> bool {
        if a == b || !self.linked.insert(Self::key(a, b)) {
            return false;
        }

        self.adjacency.entry(a.to_string()).or_default().push(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().push(a.to_string());
        self.edges.push(GraphEdge {
            source: a.to_string(),
            target: b.to_string(),
            relation,
        });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Direct neighbours of a passage
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Label of the edge between two passages
    pub fn relation(&self, a: &str, b: &str) -> Option<Relation> {
        if !self.linked.contains(&Self::key(a, b)) {
            return None;
        }
        self.edges
            .iter()
            .find(|e| (e.source == a && e.target == b) || (e.source == b && e.target == a))
            .map(|e| e.relation)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Ids within `cutoff` hops of `id`, including `id` itself.
    /// Empty when `id` is not in the graph.
    pub fn neighborhood(&self, id: &str, cutoff: usize) -> HashSet<String> {
        let mut seen = HashSet::new();
        if !self.contains(id) {
            return seen;
        }

        let mut queue = VecDeque::new();
        seen.insert(id.to_string());
        queue.push_back((id, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth == cutoff {
                continue;
            }
            for neighbor in self.neighbors(current) {
                if seen.insert(neighbor.clone()) {
                    queue.push_back((neighbor.as_str(), depth + 1));
                }
            }
        }

        seen
    }

    /// Union of the `cutoff`-hop neighbourhoods of every id
    pub fn reachable_from<'a, I>(&self, ids: I, cutoff: usize) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut reachable = HashSet::new();
        for id in ids {
            reachable.extend(self.neighborhood(id, cutoff));
        }
        reachable
    }

    /// Keep the items whose id lies in the union of all items'
    /// neighbourhoods. Order is preserved; applying it twice changes nothing.
    pub fn contract<T, F>(&self, items: Vec<T>, cutoff: usize, id_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let reachable = self.reachable_from(items.iter().map(|item| id_of(item)), cutoff);
        items
            .into_iter()
            .filter(|item| reachable.contains(id_of(item)))
            .collect()
    }

    /// Serialisable form
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<String> = self.adjacency.keys().cloned().collect();
        nodes.sort();
        GraphSnapshot {
            built_at: Utc::now(),
            nodes,
            edges: self.edges.clone(),
        }
    }

    /// Rebuild from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new();
        for edge in &snapshot.edges {
            graph.add_edge(&edge.source, &edge.target, edge.relation);
        }
        graph
    }

    /// Load a snapshot from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::NotFound {
            resource_type: "graph snapshot".to_string(),
            id: format!("{} ({})", path.display(), e),
        })?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write a snapshot to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(&self.to_snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Persisted relation graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub built_at: DateTime<Utc>,

    /// Every id that has at least one edge
    pub nodes: Vec<String>,

    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> RelationGraph {
        // a - b - c - d, e isolated from the chain but linked to f
        let mut graph = RelationGraph::new();
        graph.add_edge("a", "b", Relation::Next);
        graph.add_edge("b", "c", Relation::Next);
        graph.add_edge("c", "d", Relation::RelatedTheme);
        graph.add_edge("e", "f", Relation::RelatedTheme);
        graph
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_graph_construction() {
        let graph = chain();
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.neighbors("b"), &["a".to_string(), "c".to_string()]);
        assert_eq!(graph.relation("d", "c"), Some(Relation::RelatedTheme));
        assert_eq!(graph.relation("a", "d"), None);
    }

    #[test]
    fn test_duplicate_edge_keeps_first_label() {
        let mut graph = RelationGraph::new();
        assert!(graph.add_edge("a", "b", Relation::Next));
        assert!(!graph.add_edge("b", "a", Relation::RelatedTheme));
        assert!(!graph.add_edge("a", "a", Relation::Next));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.relation("a", "b"), Some(Relation::Next));
    }

    #[test]
    fn test_neighborhood_respects_cutoff() {
        let graph = chain();
        assert_eq!(graph.neighborhood("a", 0), set(&["a"]));
        assert_eq!(graph.neighborhood("a", 1), set(&["a", "b"]));
        assert_eq!(graph.neighborhood("a", 2), set(&["a", "b", "c"]));
        assert_eq!(graph.neighborhood("a", 10), set(&["a", "b", "c", "d"]));
        assert!(graph.neighborhood("zzz", 2).is_empty());
    }

    #[test]
    fn test_contract_drops_unconnected_items() {
        let graph = chain();
        let items = vec!["a", "d", "e", "unknown"];
        let kept = graph.contract(items, 2, |s| *s);
        // a and d are each in their own 2-hop neighbourhood; e is too
        assert_eq!(kept, vec!["a", "d", "e"]);
    }

    #[test]
    fn test_contract_is_idempotent() {
        let graph = chain();
        let items = vec!["a", "c", "e", "x", "d"];
        let once = graph.contract(items, 1, |s| *s);
        let twice = graph.contract(once.clone(), 1, |s| *s);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_edges() {
        let graph = chain();
        let restored = RelationGraph::from_snapshot(graph.to_snapshot());
        assert_eq!(restored.edges(), graph.edges());
        assert_eq!(restored.neighborhood("a", 3), graph.neighborhood("a", 3));
    }
}
