pub mod engine;
pub mod similarity;
pub mod subgraph;

pub use engine::QueryEngine;
pub use similarity::{cosine_similarity, top_k_nodes};
pub use subgraph::{ContextFact, Subgraph, induce_subgraph, n_hop_nodes, n_hop_subgraph};
