use anyhow::{Context, Result};
use tracing::{debug, info};

use graph::{EmbedTask, Embedder, EmbeddingRecord, GraphStore, Namespaces};

use crate::similarity::top_k_nodes;
use crate::subgraph::{Subgraph, n_hop_subgraph};

/// Query-time retrieval: embed the question, seed with the top-K most
/// similar graph nodes, expand N hops, induce the grounding subgraph.
pub struct QueryEngine<E> {
    store: GraphStore,
    embeddings: Vec<EmbeddingRecord>,
    embedder: E,
    ns: Namespaces,
}

impl<E: Embedder> QueryEngine<E> {
    pub fn new(
        store: GraphStore,
        embeddings: Vec<EmbeddingRecord>,
        embedder: E,
        ns: Namespaces,
    ) -> Self {
        Self {
            store,
            embeddings,
            embedder,
            ns,
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.ns
    }

    pub async fn retrieve(&self, query: &str, k: usize, hops: usize) -> Result<Subgraph> {
        let vectors = self
            .embedder
            .embed(&[query.to_string()], EmbedTask::SearchQuery)
            .await
            .context("Failed to embed query")?;
        let query_embedding = vectors
            .into_iter()
            .next()
            .context("Embedding response was empty")?;

        if let Some(first) = self.embeddings.first() {
            if first.embedding.len() != query_embedding.len() {
                anyhow::bail!(
                    "Query embedding dimension {} does not match stored dimension {}",
                    query_embedding.len(),
                    first.embedding.len()
                );
            }
        }

        let seeds: Vec<String> = top_k_nodes(&query_embedding, &self.embeddings, k)
            .into_iter()
            .map(String::from)
            .collect();
        debug!(?seeds, "seed nodes");

        let subgraph = n_hop_subgraph(&self.store, &seeds, hops);
        info!(
            seeds = seeds.len(),
            edges = subgraph.len(),
            "retrieved subgraph"
        );

        Ok(subgraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graph::{Edge, Term};

    /// Maps known texts to fixed vectors.
    struct LookupEmbedder;

    #[async_trait]
    impl Embedder for LookupEmbedder {
        async fn embed(&self, texts: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| match text.as_str() {
                    "who is Ada?" => vec![1.0, 0.0],
                    _ => vec![0.0, 1.0],
                })
                .collect())
        }
    }

    fn record(node: &str, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            node: node.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_retrieve_seeds_expands_and_induces() {
        let ns = Namespaces::default();
        let ada = ns.instance_uri("Ada");
        let engine_node = ns.instance_uri("Engine");
        let store = GraphStore::from_edges([
            Edge {
                subject: ada.clone(),
                predicate: ns.instance_uri("built"),
                object: Term::Node(engine_node.clone()),
            },
            Edge {
                subject: engine_node.clone(),
                predicate: ns.instance_uri("finished"),
                object: Term::Literal("never".to_string()),
            },
        ]);
        let embeddings = vec![
            record(&ada, vec![1.0, 0.0]),
            record(&engine_node, vec![0.0, 1.0]),
        ];

        let engine = QueryEngine::new(store, embeddings, LookupEmbedder, ns.clone());
        let subgraph = engine.retrieve("who is Ada?", 1, 1).await.unwrap();

        assert_eq!(subgraph.len(), 2);
        assert_eq!(
            subgraph.format_context(&ns),
            "- Ada built: Engine\n- Engine finished: never"
        );
    }

    #[tokio::test]
    async fn test_retrieve_rejects_mismatched_dimensions() {
        let ns = Namespaces::default();
        let embeddings = vec![record(&ns.instance_uri("Ada"), vec![1.0, 0.0, 0.0])];
        let engine = QueryEngine::new(GraphStore::new(), embeddings, LookupEmbedder, ns);

        assert!(engine.retrieve("who is Ada?", 1, 1).await.is_err());
    }
}
