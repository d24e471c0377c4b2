pub mod edge;
pub mod embeddings;
pub mod ns;
pub mod store;

pub use edge::{Edge, EdgeBuilder, Term};
pub use embeddings::{
    EmbedTask, Embedder, EmbeddingRecord, HttpEmbeddingClient, embed_graph_nodes, load_embeddings,
    save_embeddings,
};
pub use ns::{Namespaces, RDF_TYPE, RDFS_LABEL, is_type_or_label};
pub use store::GraphStore;

use extract::{OntologyTriplet, SimpleTriplet};

/// Assemble a graph from schema-free triplets.
pub fn assemble_simple<'a>(
    builder: &EdgeBuilder,
    triplets: impl IntoIterator<Item = &'a SimpleTriplet>,
) -> GraphStore {
    let mut store = GraphStore::new();
    for triplet in triplets {
        store.extend(builder.simple_edges(triplet));
    }
    store
}

/// Assemble a graph from ontology triplets, type assertions included.
pub fn assemble_ontology<'a>(
    builder: &EdgeBuilder,
    triplets: impl IntoIterator<Item = &'a OntologyTriplet>,
) -> GraphStore {
    let mut store = GraphStore::new();
    for triplet in triplets {
        store.extend(builder.ontology_edges(triplet));
    }
    store
}
