pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::TextChunk;
pub use chunker::{Chunker, ChunkingOptions};
pub use reader::FileReader;

use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Chunk a single text file into sentence windows.
pub async fn chunk_file(path: &Path, options: ChunkingOptions) -> Result<Vec<TextChunk>> {
    let content = FileReader::read_file(path).await?;
    let chunker = Chunker::new(options);
    let chunks = chunker.chunk_text(&content);
    info!(file = %path.display(), chunks = chunks.len(), "chunked document");
    Ok(chunks)
}

/// Chunk every readable file under a directory.
pub async fn chunk_directory(dir: &Path, options: ChunkingOptions) -> Result<Vec<TextChunk>> {
    let files = FileReader::read_directory(dir).await?;
    let chunker = Chunker::new(options);

    // Window index runs across the whole batch so ids stay unique even when
    // two files produce an identical window.
    let mut all_chunks: Vec<TextChunk> = Vec::new();
    for (path, content) in files {
        let windows = chunker.chunk_sentences(&content);
        let before = all_chunks.len();
        for window in windows {
            let index = all_chunks.len();
            all_chunks.push(TextChunk::new(window.join(". "), index));
        }
        info!(file = %path, chunks = all_chunks.len() - before, "chunked document");
    }

    Ok(all_chunks)
}
