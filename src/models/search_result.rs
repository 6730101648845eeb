// file: src/models/search_result.rs
// description: Search result model with similarity scores
// reference: Used for vector similarity search results

use crate::models::Chunk;
use crate::utils::Validator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,

    /// Similarity score (higher is more similar)
    pub score: f32,

    /// Distance reported by the backing store, when it has one
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32, distance: Option<f32>) -> Self {
        Self {
            chunk,
            score,
            distance,
        }
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn format_summary(&self, max_content_len: usize) -> String {
        format!(
            "Score: {:.4} | chunk #{} ({} words)\n{}\n",
            self.score,
            self.chunk.index,
            self.chunk.word_count,
            Validator::truncate_text(&self.chunk.text, max_content_len)
        )
    }
}
