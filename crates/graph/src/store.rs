use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::edge::{Edge, Term};

/// Append-only edge collection with subject and object adjacency indexes,
/// so neighbor lookup during BFS does not scan the whole edge list. The
/// object index covers named terms only; literals are never looked up.
/// Duplicate edges are kept: assembly is idempotent at the multiset level.
#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    edges: Vec<Edge>,
    subject_index: HashMap<String, Vec<usize>>,
    object_index: HashMap<String, Vec<usize>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut store = Self::new();
        store.extend(edges);
        store
    }

    pub fn insert(&mut self, edge: Edge) {
        let index = self.edges.len();
        self.subject_index
            .entry(edge.subject.clone())
            .or_default()
            .push(index);
        if let Term::Node(object) = &edge.object {
            self.object_index
                .entry(object.clone())
                .or_default()
                .push(index);
        }
        self.edges.push(edge);
    }

    pub fn extend(&mut self, edges: impl IntoIterator<Item = Edge>) {
        for edge in edges {
            self.insert(edge);
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges whose subject is `node`, in insertion order.
    pub fn edges_from(&self, node: &str) -> impl Iterator<Item = &Edge> {
        self.subject_index
            .get(node)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Edges whose object is the named resource `node`, in insertion order.
    pub fn edges_to(&self, node: &str) -> impl Iterator<Item = &Edge> {
        self.object_index
            .get(node)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Unique named nodes under `prefix` (subjects and objects), in
    /// first-seen edge order. This ordering is what the embedding document
    /// preserves and what retrieval ties break on.
    pub fn nodes_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut nodes = Vec::new();
        for edge in &self.edges {
            if edge.subject.starts_with(prefix) && seen.insert(edge.subject.clone()) {
                nodes.push(edge.subject.clone());
            }
            if let Term::Node(object) = &edge.object {
                if object.starts_with(prefix) && seen.insert(object.clone()) {
                    nodes.push(object.clone());
                }
            }
        }
        nodes
    }

    /// Persist the graph document: the plain edge list as JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.edges)
            .context("Failed to serialize graph document")?;
        tokio::fs::write(path, json)
            .await
            .context(format!("Failed to write graph document: {:?}", path))?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read graph document: {:?}", path))?;
        let edges: Vec<Edge> =
            serde_json::from_str(&content).context("Graph document is not a JSON edge list")?;
        Ok(Self::from_edges(edges))
    }
}
