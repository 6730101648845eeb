// file: src/index/store.rs
// description: vector store selection between the in-memory and LanceDB backends

use crate::config::{IndexBackend, IndexConfig};
use crate::error::{RagError, Result};
use crate::index::lance::LanceDbIndex;
use crate::index::memory::InMemoryVectorIndex;
use crate::models::{Chunk, SearchResult};

pub enum VectorStore {
    Memory(InMemoryVectorIndex),
    LanceDb(LanceDbIndex),
}

impl VectorStore {
    pub async fn open(config: &IndexConfig, dimension: usize) -> Result<Self> {
        match config.backend {
            IndexBackend::Memory => Ok(VectorStore::Memory(InMemoryVectorIndex::new(dimension))),
            IndexBackend::Lancedb => Ok(VectorStore::LanceDb(
                LanceDbIndex::connect(&config.uri, &config.table_name, dimension).await?,
            )),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, VectorStore::LanceDb(_))
    }

    pub fn describe(&self) -> String {
        match self {
            VectorStore::Memory(_) => "in-memory".to_string(),
            VectorStore::LanceDb(lance) => {
                format!("lancedb:{}/{}", lance.uri(), lance.table_name())
            }
        }
    }

    pub async fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<usize> {
        match self {
            VectorStore::Memory(memory) => memory.add(chunks, embeddings),
            VectorStore::LanceDb(lance) => lance.add(&chunks, &embeddings).await,
        }
    }

    pub async fn search(&self, query_embedding: Vec<f32>, k: usize) -> Result<Vec<SearchResult>> {
        match self {
            VectorStore::Memory(memory) => Ok(memory.search(&query_embedding, k)),
            VectorStore::LanceDb(lance) => lance.search(query_embedding, k).await,
        }
    }

    pub async fn len(&self) -> Result<usize> {
        match self {
            VectorStore::Memory(memory) => Ok(memory.len()),
            VectorStore::LanceDb(lance) => lance.count().await,
        }
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn contains_document(&self, document_hash: &str) -> Result<bool> {
        match self {
            VectorStore::Memory(memory) => Ok(memory.contains_document(document_hash)),
            VectorStore::LanceDb(lance) => lance.contains_document(document_hash).await,
        }
    }

    pub async fn remove_document(&mut self, document_hash: &str) -> Result<()> {
        match self {
            VectorStore::Memory(memory) => {
                memory.remove_document(document_hash);
                Ok(())
            }
            VectorStore::LanceDb(lance) => lance.remove_document(document_hash).await,
        }
    }

    pub async fn chunks(&self) -> Result<Vec<Chunk>> {
        match self {
            VectorStore::Memory(memory) => Ok(memory.chunks()),
            VectorStore::LanceDb(lance) => lance.chunks().await,
        }
    }

    /// Drops every persisted chunk. The in-memory backend refuses: a fresh
    /// process already starts empty and nothing outlives it.
    pub async fn reset(&mut self) -> Result<()> {
        match self {
            VectorStore::Memory(_) => Err(RagError::Config(
                "index.backend is \"memory\"; there is no persisted index to reset".to_string(),
            )),
            VectorStore::LanceDb(lance) => lance.clear().await,
        }
    }
}
