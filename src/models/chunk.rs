// file: src/models/chunk.rs
// description: text chunk produced by the sentence splitter and stored in the index

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_hash: String,
    pub source_url: String,
    /// Position of the chunk within its document, starting at 0
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

impl Chunk {
    pub fn new(document_hash: &str, source_url: &str, index: usize, text: String) -> Self {
        let word_count = text.split_whitespace().count();
        Self {
            id: Uuid::new_v4().to_string(),
            document_hash: document_hash.to_string(),
            source_url: source_url.to_string(),
            index,
            text,
            word_count,
        }
    }
}
