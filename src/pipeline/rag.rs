// file: src/pipeline/rag.rs
// description: coordinates fetching, extraction, chunking, embedding and question answering
// reference: orchestrates the asynchronous retrieval-augmented generation workflow

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::index::{Embedder, VectorStore};
use crate::llm::{ChatClient, ChatMessage, PromptTemplate};
use crate::models::{Answer, Chunk, Document, SearchResult};
use crate::parser::{PdfExtractor, SentenceSplitter, TextNormalizer};
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::source::DocumentFetcher;
use crate::utils::{OperationTimer, Validator};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a single `ingest` call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source_url: String,
    pub document_hash: String,
    pub page_count: usize,
    pub chunks_indexed: usize,
    /// True when the document was already indexed and nothing was done
    pub skipped: bool,
    pub from_cache: bool,
    pub stats: PipelineStats,
}

pub struct RagPipeline {
    config: Config,
    fetcher: DocumentFetcher,
    extractor: PdfExtractor,
    normalizer: TextNormalizer,
    splitter: SentenceSplitter,
    embedder: Embedder,
    store: VectorStore,
    prompt: PromptTemplate,
    chat: Option<ChatClient>,
    show_progress: bool,
    colored_progress: bool,
}

impl RagPipeline {
    pub async fn new(config: Config) -> Result<Self> {
        let fetcher = DocumentFetcher::new(config.source.clone())?;
        let splitter = SentenceSplitter::new(config.index.chunk_size, config.index.chunk_overlap)?;
        let embedder = Embedder::from_config(&config)?;
        let store = VectorStore::open(&config.index, embedder.dimension()).await?;

        let prompt = match &config.llm.qa_template {
            Some(template) => PromptTemplate::with_custom_template(template.clone())?,
            None => PromptTemplate::new(),
        };

        let chat = match config.llm.api_key.as_deref() {
            Some(key) => Some(ChatClient::new(&config.llm, key.to_string())?),
            None => {
                debug!(
                    "{} not set, question answering is unavailable",
                    config.llm.api_key_env
                );
                None
            }
        };

        info!(
            "Pipeline ready (embedder: {}, store: {})",
            embedder.describe(),
            store.describe()
        );

        Ok(Self {
            config,
            fetcher,
            extractor: PdfExtractor::new(),
            normalizer: TextNormalizer::new(),
            splitter,
            embedder,
            store,
            prompt,
            chat,
            show_progress: false,
            colored_progress: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored_progress = colored;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn chat_client(&self) -> Option<&ChatClient> {
        self.chat.as_ref()
    }

    pub async fn ingest(&mut self, location: &str, force: bool) -> Result<IngestReport> {
        info!("Ingesting {}", location);

        let fetched = self.fetcher.fetch(location, force).await?;
        let from_cache = fetched.from_cache;

        let pages = self.extractor.extract_pages_blocking(fetched.bytes).await?;
        let pages: Vec<String> = pages
            .iter()
            .map(|page| self.normalizer.normalize(page))
            .collect();
        let document = Document::from_pages(fetched.location, &pages)?;

        info!(
            "Loaded {} pages ({} bytes, hash {})",
            document.page_count,
            document.byte_size,
            document.short_hash()
        );

        let already_indexed = self.store.contains_document(&document.content_hash).await?;
        if already_indexed && !force {
            info!("Document {} already indexed, skipping", document.short_hash());
            return Ok(IngestReport {
                source_url: document.source_url,
                document_hash: document.content_hash,
                page_count: document.page_count,
                chunks_indexed: 0,
                skipped: true,
                from_cache,
                stats: PipelineStats::new(),
            });
        }

        let (chunks, embeddings, stats) = self.embed_document(&document).await?;

        if already_indexed {
            warn!("Re-indexing document {}", document.short_hash());
            self.store.remove_document(&document.content_hash).await?;
        }
        let chunks_indexed = self.store.add(chunks, embeddings).await?;

        Ok(IngestReport {
            source_url: document.source_url,
            document_hash: document.content_hash,
            page_count: document.page_count,
            chunks_indexed,
            skipped: false,
            from_cache,
            stats,
        })
    }

    /// Splits, embeds and stores one document.
    pub async fn index_document(&mut self, document: &Document) -> Result<(usize, PipelineStats)> {
        let (chunks, embeddings, stats) = self.embed_document(document).await?;
        let added = self.store.add(chunks, embeddings).await?;
        Ok((added, stats))
    }

    /// Splits and embeds without touching the store. Batches are embedded one
    /// at a time and the first failing batch aborts the document, so callers
    /// only write once every chunk has a vector.
    async fn embed_document(
        &self,
        document: &Document,
    ) -> Result<(Vec<Chunk>, Vec<Vec<f32>>, PipelineStats)> {
        let texts = self.splitter.split(&document.text);
        if texts.is_empty() {
            return Err(RagError::Validation(
                "Document produced no chunks".to_string(),
            ));
        }

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(&document.content_hash, &document.source_url, i, text))
            .collect();

        info!("Split document into {} chunks", chunks.len());

        let progress = if self.show_progress {
            ProgressTracker::with_color(chunks.len(), self.colored_progress)
        } else {
            ProgressTracker::hidden(chunks.len())
        };

        let batch_size = self.config.embedding.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let bytes: u64 = texts.iter().map(|t| t.len() as u64).sum();
            progress.set_message(format!("Embedding chunk {}", batch[0].index));

            match self.embedder.embed_documents(&texts).await {
                Ok(vectors) => {
                    embeddings.extend(vectors);
                    progress.batch_completed(batch.len(), bytes);
                }
                Err(e) => {
                    progress.batch_failed();
                    return Err(e);
                }
            }
        }

        progress.finish();
        let stats = progress.get_stats();
        log_final_stats(&stats);

        Ok((chunks, embeddings, stats))
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let question = Validator::sanitize_question(question)?;
        if top_k == 0 {
            return Err(RagError::Validation("top_k must be at least 1".to_string()));
        }

        let timer = OperationTimer::new("retrieve");
        let query_embedding = self.embedder.embed_query(&question).await?;
        let results = self.store.search(query_embedding, top_k).await?;
        timer.finish_with_count(results.len(), "chunks");

        Ok(results)
    }

    pub fn build_messages(&self, question: &str, sources: &[SearchResult]) -> Vec<ChatMessage> {
        let context = PromptTemplate::build_context(sources, self.config.llm.max_context_chars);
        let mut messages = Vec::with_capacity(2);

        if let Some(system_prompt) = &self.config.llm.system_prompt {
            messages.push(ChatMessage::system(system_prompt.clone()));
        }
        messages.push(ChatMessage::user(self.prompt.format(&context, question)));
        messages
    }

    pub async fn query(&self, question: &str) -> Result<Answer> {
        self.query_with_top_k(question, self.config.index.top_k).await
    }

    pub async fn query_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        let chat = self
            .chat
            .as_ref()
            .ok_or_else(|| RagError::MissingApiKey(self.config.llm.api_key_env.clone()))?;

        if self.store.is_empty().await? {
            return Err(RagError::EmptyIndex);
        }

        let start = Instant::now();
        let question = Validator::sanitize_question(question)?;
        let sources = self.retrieve(&question, top_k).await?;
        let messages = self.build_messages(&question, &sources);

        info!("Querying {} with {} context chunks", chat.model(), sources.len());
        let completion = chat.complete(&messages).await?;

        Ok(Answer {
            question,
            response: completion.content,
            model: completion.model,
            sources,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn log_final_stats(stats: &PipelineStats) {
    info!("=== Embedding Summary ===");
    info!("Duration: {:.2} seconds", stats.duration_secs);
    info!("Chunks embedded: {}", stats.chunks_embedded);
    info!(
        "Batches: {} completed, {} failed",
        stats.batches_completed, stats.batches_failed
    );
    info!(
        "Throughput: {:.1} chunks/sec, {:.1} KiB/sec",
        stats.chunks_per_second(),
        stats.bytes_per_second() / 1024.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use crate::index::HostedEmbeddingClient;
    use crate::parser::pdf::test_support::build_pdf;
    use std::time::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn offline_config() -> Config {
        let mut config = Config::default_config();
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.embedding.dimension = 64;
        config.embedding.batch_size = 2;
        config.index.chunk_size = 12;
        config.index.chunk_overlap = 0;
        config.llm.api_key = None;
        config.source.cache_dir = None;
        config
    }

    fn write_paper(dir: &TempDir) -> String {
        let bytes = build_pdf(&[
            &[
                "Effective long context scaling extends Llama 2.",
                "The models support a context window of 32768 tokens.",
            ],
            &[
                "Continual pretraining uses longer training sequences.",
                "Instruction tuning needs no human annotated long data.",
            ],
        ]);
        let path = dir.path().join("paper.pdf");
        std::fs::write(&path, bytes).unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_ingest_then_retrieve() {
        let dir = TempDir::new().unwrap();
        let location = write_paper(&dir);
        let mut pipeline = RagPipeline::new(offline_config()).await.unwrap();

        let report = pipeline.ingest(&location, false).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.page_count, 2);
        assert!(report.chunks_indexed >= 2);
        assert_eq!(report.stats.chunks_embedded, report.chunks_indexed);
        assert_eq!(report.stats.batches_failed, 0);
        assert_eq!(
            pipeline.store().len().await.unwrap(),
            report.chunks_indexed
        );

        let hits = pipeline
            .retrieve("What context window do the models support?", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.chunk.document_hash == report.document_hash));
    }

    #[tokio::test]
    async fn test_second_ingest_is_skipped_unless_forced() {
        let dir = TempDir::new().unwrap();
        let location = write_paper(&dir);
        let mut pipeline = RagPipeline::new(offline_config()).await.unwrap();

        let first = pipeline.ingest(&location, false).await.unwrap();
        let second = pipeline.ingest(&location, false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.chunks_indexed, 0);
        assert_eq!(second.document_hash, first.document_hash);

        let forced = pipeline.ingest(&location, true).await.unwrap();
        assert!(!forced.skipped);
        assert_eq!(forced.chunks_indexed, first.chunks_indexed);
        assert_eq!(
            pipeline.store().len().await.unwrap(),
            first.chunks_indexed
        );
    }

    #[tokio::test]
    async fn test_ingest_with_plain_progress() {
        let dir = TempDir::new().unwrap();
        let location = write_paper(&dir);
        let mut pipeline = RagPipeline::new(offline_config())
            .await
            .unwrap()
            .with_progress(true)
            .with_color(false);
        assert!(!pipeline.colored_progress);

        let report = pipeline.ingest(&location, false).await.unwrap();
        assert_eq!(report.stats.chunks_embedded, report.chunks_indexed);
        assert!(report.stats.total_bytes_processed > 0);
    }

    #[tokio::test]
    async fn test_failed_reindex_keeps_existing_chunks() {
        let dir = TempDir::new().unwrap();
        let location = write_paper(&dir);
        let mut pipeline = RagPipeline::new(offline_config()).await.unwrap();

        let first = pipeline.ingest(&location, false).await.unwrap();
        assert!(first.chunks_indexed > 0);

        // Nothing listens on the discard port, so every batch fails.
        pipeline.embedder = Embedder::Hosted(
            HostedEmbeddingClient::new(
                "http://127.0.0.1:9/v1".to_string(),
                "key".to_string(),
                "model".to_string(),
                64,
                Duration::from_secs(2),
            )
            .unwrap(),
        );

        let err = pipeline.ingest(&location, true).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert_eq!(
            pipeline.store().len().await.unwrap(),
            first.chunks_indexed
        );
        assert!(
            pipeline
                .store()
                .contains_document(&first.document_hash)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_query_without_api_key() {
        let pipeline = RagPipeline::new(offline_config()).await.unwrap();
        assert!(pipeline.chat_client().is_none());

        let err = pipeline.query("What is the context window?").await.unwrap_err();
        assert!(matches!(err, RagError::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn test_query_on_empty_index() {
        let mut config = offline_config();
        config.llm.api_key = Some("test-key".to_string());
        let pipeline = RagPipeline::new(config).await.unwrap();

        let err = pipeline.query("What is the context window?").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_blank_question() {
        let pipeline = RagPipeline::new(offline_config()).await.unwrap();
        assert!(matches!(
            pipeline.retrieve("   ", 2).await,
            Err(RagError::Validation(_))
        ));
        assert!(matches!(
            pipeline.retrieve("question", 0).await,
            Err(RagError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_build_messages_uses_template() {
        let mut config = offline_config();
        config.llm.system_prompt = Some("Answer briefly.".to_string());
        let pipeline = RagPipeline::new(config).await.unwrap();

        let sources = vec![
            SearchResult::new(Chunk::new("h", "u", 0, "alpha".to_string()), 0.9, None),
            SearchResult::new(Chunk::new("h", "u", 1, "beta".to_string()), 0.8, None),
        ];
        let messages = pipeline.build_messages("What?", &sources);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("Answer briefly."));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("alpha\n\nbeta"));
        assert!(messages[1].content.contains("Query: What?"));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let mut pipeline = RagPipeline::new(offline_config()).await.unwrap();
        assert!(pipeline.ingest("/nonexistent/paper.pdf", false).await.is_err());
        assert!(pipeline.store().is_empty().await.unwrap());
    }
}
