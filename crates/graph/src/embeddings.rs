use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::ns::Namespaces;
use crate::store::GraphStore;

/// Embedding API batch size; keeps single requests within provider limits.
const EMBED_BATCH_SIZE: usize = 100;

/// Task prefix prepended to every embedded text. Asymmetric models (e.g.
/// nomic) distinguish stored documents from queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    SearchDocument,
    SearchQuery,
}

impl EmbedTask {
    fn prefix(self) -> &'static str {
        match self {
            EmbedTask::SearchDocument => "search_document: ",
            EmbedTask::SearchQuery => "search_query: ",
        }
    }
}

/// Embedding boundary; tests supply fixed vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>>;
}

#[derive(Clone)]
pub struct HttpEmbeddingClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts
                .iter()
                .map(|text| format!("{}{}", task.prefix(), text))
                .collect(),
            encoding_format: "float",
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send embedding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Embedding request failed: {}", response.status());
        }

        let mut embedding_response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        // Providers may return out of order; the index field restores
        // request order.
        embedding_response.data.sort_by_key(|d| d.index);
        Ok(embedding_response
            .data
            .into_iter()
            .map(|d| d.embedding)
            .collect())
    }
}

/// One embedded graph node. The document is an ordered array: retrieval
/// breaks score ties by this order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub node: String,
    pub embedding: Vec<f32>,
}

/// Embed every base-prefixed named node of the graph, in first-seen order.
/// Texts are the nodes' local names; batches are size-checked and all
/// vectors must share one dimension.
pub async fn embed_graph_nodes(
    store: &GraphStore,
    ns: &Namespaces,
    embedder: &impl Embedder,
) -> Result<Vec<EmbeddingRecord>> {
    let nodes = store.nodes_with_prefix(&ns.base);
    info!(nodes = nodes.len(), "embedding graph nodes");

    let names: Vec<String> = nodes.iter().map(|node| ns.local_name(node)).collect();

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(nodes.len());
    for batch in names.chunks(EMBED_BATCH_SIZE) {
        let batch_vectors = embedder.embed(batch, EmbedTask::SearchDocument).await?;
        if batch_vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding batch size mismatch: requested {}, received {}",
                batch.len(),
                batch_vectors.len()
            );
        }
        vectors.extend(batch_vectors);
    }

    if let Some(first) = vectors.first() {
        let dimension = first.len();
        if vectors.iter().any(|v| v.len() != dimension) {
            anyhow::bail!("Embeddings do not share a single dimension");
        }
    }

    Ok(nodes
        .into_iter()
        .zip(vectors)
        .map(|(node, embedding)| EmbeddingRecord { node, embedding })
        .collect())
}

/// Persist the embeddings document.
pub async fn save_embeddings(records: &[EmbeddingRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .context("Failed to serialize embeddings document")?;
    tokio::fs::write(path, json)
        .await
        .context(format!("Failed to write embeddings document: {:?}", path))?;
    Ok(())
}

/// Load the embeddings document, enforcing the shared-dimension invariant.
pub async fn load_embeddings(path: &Path) -> Result<Vec<EmbeddingRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .context(format!("Failed to read embeddings document: {:?}", path))?;
    let records: Vec<EmbeddingRecord> = serde_json::from_str(&content)
        .context("Embeddings document is not a JSON array of records")?;

    if let Some(first) = records.first() {
        let dimension = first.embedding.len();
        if records.iter().any(|r| r.embedding.len() != dimension) {
            anyhow::bail!("Embeddings document mixes vector dimensions");
        }
    }

    Ok(records)
}
