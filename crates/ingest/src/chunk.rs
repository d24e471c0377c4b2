use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: String,
    pub content: String,
}

impl TextChunk {
    pub fn new(content: String, index: usize) -> Self {
        // Generate stable id from content + window position
        let id = Self::generate_id(&content, index);

        Self { id, content }
    }

    fn generate_id(content: &str, index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update(index.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }
}
