// file: src/index/mod.rs
// description: embeddings and vector store module exports
// reference: internal module structure

pub mod embeddings;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod store;

pub use embeddings::{Embedder, HashingEmbedder, HostedEmbeddingClient};
pub use lance::LanceDbIndex;
pub use memory::{InMemoryVectorIndex, cosine_similarity};
pub use store::VectorStore;
