use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::chunk::TextChunk;

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// Load a pre-chunked document: a JSON array of `{id, content}` objects.
    pub async fn read_chunk_file(path: &Path) -> Result<Vec<TextChunk>> {
        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read chunk file: {:?}", path))?;
        let chunks: Vec<TextChunk> =
            serde_json::from_str(&content).context("Chunk file is not a JSON array of chunks")?;
        Ok(chunks)
    }

    /// Recursively discover readable source files under a directory.
    pub fn discover_files(dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                matches!(
                    entry.path().extension().and_then(|e| e.to_str()),
                    Some("txt") | Some("md")
                )
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    pub async fn read_directory(dir: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();

        for path in Self::discover_files(dir) {
            let content = Self::read_file(&path).await?;
            files.push((path.to_string_lossy().to_string(), content));
        }

        Ok(files)
    }
}
