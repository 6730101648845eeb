// file: src/index/memory.rs
// description: in-process vector index with brute-force cosine similarity search

use crate::error::{RagError, Result};
use crate::models::{Chunk, SearchResult};
use tracing::debug;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    dimension: usize,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl InMemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(RagError::Index(format!(
                "Embedding dimension {} does not match index dimension {}",
                bad.len(),
                self.dimension
            )));
        }

        let added = chunks.len();
        self.entries.extend(chunks.into_iter().zip(embeddings));
        debug!("In-memory index now holds {} chunks", self.entries.len());
        Ok(added)
    }

    /// Top `k` chunks by descending cosine similarity; equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, embedding))| (i, cosine_similarity(query, embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchResult::new(self.entries[i].0.clone(), score, None))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_document(&self, document_hash: &str) -> bool {
        self.entries
            .iter()
            .any(|(chunk, _)| chunk.document_hash == document_hash)
    }

    pub fn remove_document(&mut self, document_hash: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(chunk, _)| chunk.document_hash != document_hash);
        before - self.entries.len()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.entries.iter().map(|(chunk, _)| chunk.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk::new("doc", "https://example.com/paper.pdf", index, text.to_string())
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score() {
        let mut index = InMemoryVectorIndex::new(2);
        index
            .add(
                vec![chunk(0, "x axis"), chunk(1, "diagonal"), chunk(2, "y axis")],
                vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]],
            )
            .unwrap();

        let results = index.search(&[0.1, 1.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "y axis");
        assert_eq!(results[1].chunk.text, "diagonal");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = InMemoryVectorIndex::new(1);
        index
            .add(
                vec![chunk(0, "first"), chunk(1, "second")],
                vec![vec![1.0], vec![2.0]],
            )
            .unwrap();

        let results = index.search(&[1.0], 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "first");
    }

    #[test]
    fn test_remove_document() {
        let mut index = InMemoryVectorIndex::new(1);
        let other = Chunk::new("other", "u", 0, "kept".to_string());
        index
            .add(vec![chunk(0, "a"), other, chunk(1, "b")], vec![vec![1.0]; 3])
            .unwrap();

        assert_eq!(index.remove_document("doc"), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunks()[0].text, "kept");
    }

    #[test]
    fn test_add_rejects_mismatches() {
        let mut index = InMemoryVectorIndex::new(2);
        assert!(index.add(vec![chunk(0, "a")], vec![]).is_err());
        assert!(index.add(vec![chunk(0, "a")], vec![vec![1.0]]).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_contains_and_remove() {
        let mut index = InMemoryVectorIndex::new(1);
        index.add(vec![chunk(0, "a")], vec![vec![1.0]]).unwrap();
        assert!(index.contains_document("doc"));
        assert!(!index.contains_document("other"));
        assert_eq!(index.chunks().len(), 1);
        assert_eq!(index.remove_document("other"), 0);

        index.add(vec![chunk(1, "b")], vec![vec![0.5]]).unwrap();
        assert_eq!(index.remove_document("doc"), 2);
        assert_eq!(index.len(), 0);
        assert!(index.search(&[1.0], 3).is_empty());
    }
}
