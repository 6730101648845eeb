// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns

pub mod config;
pub mod error;
pub mod exporter;
pub mod index;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod utils;

pub use config::{
    Config, EmbeddingConfig, EmbeddingProvider, IndexBackend, IndexConfig, LlmConfig, SourceConfig,
};
pub use error::{RagError, Result};
pub use exporter::{ExportManifest, ExportedChunk, JsonExporter};
pub use index::{Embedder, InMemoryVectorIndex, LanceDbIndex, VectorStore};
pub use llm::{ChatClient, ChatMessage, Completion, PromptTemplate};
pub use mcp::PaperRagMcp;
pub use models::{Answer, Chunk, Document, SearchResult};
pub use parser::{PdfExtractor, SentenceSplitter, TextNormalizer};
pub use pipeline::{IngestReport, PipelineStats, ProgressTracker, RagPipeline};
pub use source::{DocumentFetcher, FetchedPdf};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        let _template = PromptTemplate::new();
        let _splitter = SentenceSplitter::default();
    }
}
