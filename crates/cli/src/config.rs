use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use graph::Namespaces;
use ingest::ChunkingOptions;

/// Run configuration, loaded from a JSON file once at startup. A config
/// that fails to load or validate is a fatal startup error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    /// Embedding model id; falls back to `model` when absent.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub retry_max: Option<usize>,
    #[serde(default)]
    pub chunking: Option<ChunkingOptions>,
    #[serde(default)]
    pub namespaces: Option<Namespaces>,
    #[serde(default)]
    pub literal_classes: Option<Vec<String>>,
}

impl PipelineConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read config file: {:?}", path))?;
        Self::from_json(&content).context(format!("Invalid config file: {:?}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).context("Config is not valid JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            anyhow::bail!("endpoint must not be empty");
        }
        if self.model.trim().is_empty() {
            anyhow::bail!("model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be within [0, 2]");
        }
        if self.concurrency == Some(0) {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.retry_max == Some(0) {
            anyhow::bail!("retry_max must be at least 1");
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(1)
    }

    pub fn retry_max(&self) -> usize {
        self.retry_max.unwrap_or(1)
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }

    pub fn chunking(&self) -> ChunkingOptions {
        self.chunking.clone().unwrap_or_default()
    }

    pub fn namespaces(&self) -> Namespaces {
        self.namespaces.clone().unwrap_or_default()
    }

    pub fn literal_classes(&self) -> Vec<String> {
        self.literal_classes
            .clone()
            .unwrap_or_else(|| vec!["E62_String".to_string()])
    }
}
