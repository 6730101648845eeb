// file: src/mcp/server.rs
// description: MCP server exposing paper ingestion, retrieval and question answering
// reference: https://docs.rs/rmcp

use crate::error::RagError;
use crate::pipeline::RagPipeline;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const DEFAULT_SEARCH_LIMIT: usize = 5;
const SOURCE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IngestArgs {
    /// PDF URL or local path (defaults to the configured paper)
    pub url: Option<String>,
    /// Re-download and re-index even if the document is already indexed
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AskArgs {
    /// Natural-language question about the paper
    pub question: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchArgs {
    /// Text to embed and match against indexed chunks
    pub query: String,
    /// Maximum number of chunks to return (default: 5)
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct PaperRagMcp {
    pipeline: Arc<Mutex<RagPipeline>>,
    tool_router: ToolRouter<Self>,
}

fn to_mcp_error(error: RagError) -> McpError {
    match error {
        RagError::Validation(_) => McpError::invalid_params(error.to_string(), None),
        _ => McpError::internal_error(error.to_string(), None),
    }
}

#[tool_router]
impl PaperRagMcp {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            tool_router: Self::tool_router(),
        }
    }

    pub fn get_tool_router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    #[tool(description = "Download a PDF, extract its text, chunk and embed it into the vector index.")]
    async fn ingest_document(
        &self,
        Parameters(args): Parameters<IngestArgs>,
    ) -> Result<CallToolResult, McpError> {
        let mut pipeline = self.pipeline.lock().await;
        let url = args
            .url
            .unwrap_or_else(|| pipeline.config().source.url.clone());
        info!("MCP: Ingesting {}", url);

        let report = pipeline
            .ingest(&url, args.force.unwrap_or(false))
            .await
            .map_err(to_mcp_error)?;

        let result_text = if report.skipped {
            format!(
                "Document already indexed:\n\
                 - Source: {}\n\
                 - Hash: {}\n\
                 Pass force=true to re-index.",
                report.source_url, report.document_hash
            )
        } else {
            format!(
                "Document ingestion complete:\n\
                 - Source: {}\n\
                 - Pages: {}\n\
                 - Chunks indexed: {}\n\
                 - Embedding time: {:.2}s",
                report.source_url,
                report.page_count,
                report.chunks_indexed,
                report.stats.duration_secs
            )
        };

        Ok(CallToolResult::success(vec![Content::text(result_text)]))
    }

    #[tool(description = "Answer a question about the ingested paper using retrieved context and the hosted LLM.")]
    async fn ask(&self, Parameters(args): Parameters<AskArgs>) -> Result<CallToolResult, McpError> {
        info!("MCP: Answering question: {}", args.question);

        let mut pipeline = self.pipeline.lock().await;
        if pipeline.chat_client().is_none() {
            let env = pipeline.config().llm.api_key_env.clone();
            return Err(to_mcp_error(RagError::MissingApiKey(env)));
        }

        if pipeline.store().is_empty().await.map_err(to_mcp_error)? {
            let url = pipeline.config().source.url.clone();
            info!("MCP: Index is empty, ingesting {} first", url);
            pipeline.ingest(&url, false).await.map_err(to_mcp_error)?;
        }

        let answer = pipeline.query(&args.question).await.map_err(to_mcp_error)?;

        let result_text = format!(
            "{}\n\nModel: {} ({} ms)\nSources:\n{}",
            answer.response,
            answer.model,
            answer.elapsed_ms,
            answer.format_sources(SOURCE_PREVIEW_CHARS)
        );

        Ok(CallToolResult::success(vec![Content::text(result_text)]))
    }

    #[tool(description = "Semantic search over indexed chunks without calling the LLM.")]
    async fn search(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        let limit = args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        info!("MCP: Searching for '{}' (limit {})", args.query, limit);

        let pipeline = self.pipeline.lock().await;
        let results = pipeline
            .retrieve(&args.query, limit)
            .await
            .map_err(to_mcp_error)?;

        if results.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No indexed chunks. Run ingest_document first.".to_string(),
            )]));
        }

        let lines: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.format_summary(SOURCE_PREVIEW_CHARS)))
            .collect();

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Found {} chunks for '{}':\n{}",
            results.len(),
            args.query,
            lines.join("\n")
        ))]))
    }

    #[tool(description = "Get configuration information about the RAG pipeline")]
    async fn get_config(&self) -> Result<CallToolResult, McpError> {
        info!("MCP: Getting configuration");

        let pipeline = self.pipeline.lock().await;
        let config = pipeline.config();
        let indexed = pipeline.store().len().await.map_err(to_mcp_error)?;

        let config_text = format!(
            "Paper RAG Configuration:\n\
             \n\
             Source:\n\
             - URL: {}\n\
             \n\
             Embeddings:\n\
             - Backend: {}\n\
             - Batch size: {}\n\
             \n\
             Index:\n\
             - Store: {}\n\
             - Chunk size: {} words (overlap {})\n\
             - Top k: {}\n\
             - Indexed chunks: {}\n\
             \n\
             LLM:\n\
             - Endpoint: {}\n\
             - Model: {}\n\
             - Temperature: {}\n\
             - API key: {}",
            config.source.url,
            pipeline.embedder().describe(),
            config.embedding.batch_size,
            pipeline.store().describe(),
            config.index.chunk_size,
            config.index.chunk_overlap,
            config.index.top_k,
            indexed,
            config.llm.api_base,
            config.llm.model,
            config.llm.temperature,
            if config.llm.api_key.is_some() {
                "set"
            } else {
                "missing"
            }
        );

        Ok(CallToolResult::success(vec![Content::text(config_text)]))
    }
}

#[tool_handler]
impl ServerHandler for PaperRagMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Ask questions about a research paper. Call ingest_document once, \
                 then use ask or search."
                    .to_string(),
            ),
        }
    }
}
