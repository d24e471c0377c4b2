use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use graph::{Edge, GraphStore, Namespaces, Term, is_type_or_label};

/// Edge set induced by one retrieval; derived, read-only, discarded after
/// use. Not necessarily connected and may carry literal-only leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    edges: Vec<Edge>,
}

/// One flattened fact for QA grounding, rendered with local names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Subgraph {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Flatten for QA context: classification edges are skipped, URIs come
    /// back as local names, literals pass through as-is.
    pub fn context_facts(&self, ns: &Namespaces) -> Vec<ContextFact> {
        self.edges
            .iter()
            .filter(|edge| !is_type_or_label(&edge.predicate))
            .map(|edge| ContextFact {
                subject: ns.local_name(&edge.subject),
                predicate: ns.local_name(&edge.predicate),
                object: match &edge.object {
                    Term::Node(uri) => ns.local_name(uri),
                    Term::Literal(value) => value.clone(),
                },
            })
            .collect()
    }

    /// One fact per line, ready to paste into a QA prompt.
    pub fn format_context(&self, ns: &Namespaces) -> String {
        self.context_facts(ns)
            .iter()
            .map(|fact| format!("- {} {}: {}", fact.subject, fact.predicate, fact.object))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Breadth-first expansion from the seed set, for exactly `hops`
/// iterations (or until the frontier empties). Traversal never crosses
/// type/label edges and never steps onto a literal.
pub fn n_hop_nodes(store: &GraphStore, seeds: &[String], hops: usize) -> HashSet<String> {
    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut frontier: Vec<String> = seeds.to_vec();

    for hop in 0..hops {
        if frontier.is_empty() {
            debug!(hop, "BFS stopped early, frontier empty");
            break;
        }

        let mut next_frontier = Vec::new();
        for node in &frontier {
            // Outgoing: node -> object
            for edge in store.edges_from(node) {
                if is_type_or_label(&edge.predicate) {
                    continue;
                }
                if let Term::Node(neighbor) = &edge.object {
                    if visited.insert(neighbor.clone()) {
                        next_frontier.push(neighbor.clone());
                    }
                }
            }
            // Incoming: subject -> node (subjects are always named)
            for edge in store.edges_to(node) {
                if is_type_or_label(&edge.predicate) {
                    continue;
                }
                if visited.insert(edge.subject.clone()) {
                    next_frontier.push(edge.subject.clone());
                }
            }
        }
        frontier = next_frontier;
    }

    visited
}

/// Keep every edge whose subject was visited and whose object is a
/// literal, a visited node, or attached via a type/label predicate. This
/// keeps literal attributes and type annotations on visited nodes even
/// though neither is an expansion target.
pub fn induce_subgraph(store: &GraphStore, visited: &HashSet<String>) -> Subgraph {
    let edges = store
        .edges()
        .iter()
        .filter(|edge| {
            if !visited.contains(&edge.subject) {
                return false;
            }
            match &edge.object {
                Term::Literal(_) => true,
                Term::Node(object) => {
                    visited.contains(object) || is_type_or_label(&edge.predicate)
                }
            }
        })
        .cloned()
        .collect();

    Subgraph { edges }
}

/// Full retrieval step 2+3: expand `hops` out from the seeds, then induce.
pub fn n_hop_subgraph(store: &GraphStore, seeds: &[String], hops: usize) -> Subgraph {
    let visited = n_hop_nodes(store, seeds, hops);
    induce_subgraph(store, &visited)
}
