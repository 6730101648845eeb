// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use paper_rag::utils::logging::{
    format_error, format_heading, format_info, format_step, format_success, format_warning,
};
use paper_rag::{
    Answer, ChatClient, Config, Embedder, HealthCheck, HealthReport, JsonExporter, PaperRagMcp,
    RagPipeline, VectorStore,
};
use rmcp::ServiceExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

const SOURCE_PREVIEW_CHARS: usize = 160;

#[derive(Parser)]
#[command(name = "paper_rag")]
#[command(version)]
#[command(
    about = "Ask questions about a research paper with retrieval-augmented generation",
    long_about = None
)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the paper if needed, then answer one question
    Ask {
        question: String,

        /// PDF URL or local path (defaults to source.url)
        #[arg(long)]
        url: Option<String>,

        #[arg(long, value_name = "NUM")]
        top_k: Option<usize>,
    },

    /// Ingest once, then answer questions read from stdin until EOF or `exit`
    Chat {
        #[arg(long)]
        url: Option<String>,
    },

    Ingest {
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        force: bool,
    },

    /// Search indexed chunks by semantic similarity without calling the LLM
    Search {
        /// Search query text
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        url: Option<String>,
    },

    Stats,

    /// Check configuration, credentials, endpoints and the vector index
    Verify,

    Reset {
        #[arg(long)]
        confirm: bool,
    },

    Export {
        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,

        #[arg(long)]
        url: Option<String>,
    },

    /// Start MCP (Model Context Protocol) server for agentic tool integration
    Mcp {
        #[arg(long, default_value = "stdio")]
        transport: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    colored::control::set_override(cli.color);
    paper_rag::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Paper RAG");
    info!("Loading configuration from: {}", cli.config.display());

    let config =
        Config::load_or_default(&cli.config).context("Failed to load configuration")?;

    match cli.command {
        Commands::Ask {
            question,
            url,
            top_k,
        } => {
            cmd_ask(config, &question, url, top_k).await?;
        }
        Commands::Chat { url } => {
            cmd_chat(config, url).await?;
        }
        Commands::Ingest { url, force } => {
            cmd_ingest(config, url, force).await?;
        }
        Commands::Search { query, limit, url } => {
            cmd_search(config, &query, limit, url).await?;
        }
        Commands::Stats => {
            cmd_stats(&config).await?;
        }
        Commands::Verify => {
            cmd_verify(&config).await?;
        }
        Commands::Reset { confirm } => {
            cmd_reset(&config, confirm).await?;
        }
        Commands::Export {
            output,
            pretty,
            url,
        } => {
            cmd_export(config, output, pretty, url).await?;
        }
        Commands::Mcp { transport } => {
            cmd_mcp(config, &transport).await?;
        }
    }

    Ok(())
}

/// Builds the pipeline and makes sure `url` (or the configured paper) is indexed.
async fn prepare_pipeline(config: Config, url: Option<String>) -> Result<RagPipeline> {
    let location = url.unwrap_or_else(|| config.source.url.clone());

    eprintln!("{}", format_step(1, 2, "Preparing pipeline"));
    let mut pipeline = RagPipeline::new(config)
        .await
        .context("Failed to initialize pipeline")?
        .with_progress(true)
        .with_color(colored::control::SHOULD_COLORIZE.should_colorize());

    eprintln!("{}", format_step(2, 2, &format!("Indexing {}", location)));
    let report = pipeline
        .ingest(&location, false)
        .await
        .with_context(|| format!("Failed to ingest {}", location))?;

    if report.skipped {
        info!("Using existing index for {}", report.document_hash);
    } else {
        info!(
            "Indexed {} chunks from {} pages",
            report.chunks_indexed, report.page_count
        );
    }

    Ok(pipeline)
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.response);
    println!();
    println!("{}", format_heading("Sources"));
    println!("{}", answer.format_sources(SOURCE_PREVIEW_CHARS));
    eprintln!(
        "{}",
        format_info(&format!("{} answered in {} ms", answer.model, answer.elapsed_ms))
    );
}

async fn cmd_ask(
    config: Config,
    question: &str,
    url: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    config
        .require_api_key()
        .context("Question answering needs the hosted LLM")?;

    let top_k = top_k.unwrap_or(config.index.top_k);
    let pipeline = prepare_pipeline(config, url).await?;

    let answer = pipeline
        .query_with_top_k(question, top_k)
        .await
        .context("Query failed")?;

    print_answer(&answer);
    Ok(())
}

async fn cmd_chat(config: Config, url: Option<String>) -> Result<()> {
    config
        .require_api_key()
        .context("Question answering needs the hosted LLM")?;

    let pipeline = prepare_pipeline(config, url).await?;

    eprintln!(
        "{}",
        format_info("Ask a question about the paper (`exit` or Ctrl-D to quit)")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stderr = tokio::io::stderr();

    loop {
        stderr.write_all(b"> ").await?;
        stderr.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match pipeline.query(question).await {
            Ok(answer) => {
                print_answer(&answer);
                println!();
            }
            Err(e) => eprintln!("{}", format_error(&format!("Query failed: {}", e))),
        }
    }

    info!("Chat session ended");
    Ok(())
}

async fn cmd_ingest(config: Config, url: Option<String>, force: bool) -> Result<()> {
    info!("Starting ingestion pipeline");
    let start_time = Instant::now();
    let location = url.unwrap_or_else(|| config.source.url.clone());

    let mut pipeline = RagPipeline::new(config)
        .await
        .context("Failed to initialize pipeline")?
        .with_progress(true)
        .with_color(colored::control::SHOULD_COLORIZE.should_colorize());

    if !pipeline.store().is_persistent() {
        warn!("Index backend is in-memory; chunks are discarded when the command exits");
    }

    let report = pipeline
        .ingest(&location, force)
        .await
        .with_context(|| format!("Failed to ingest {}", location))?;

    if report.skipped {
        eprintln!(
            "{}",
            format_warning("Document already indexed (use --force to re-index)")
        );
    } else {
        eprintln!(
            "{}",
            format_success(&format!(
                "Indexed {} chunks from {} pages{}",
                report.chunks_indexed,
                report.page_count,
                if report.from_cache { " (cached download)" } else { "" }
            ))
        );
    }

    info!(
        "Ingestion complete in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn cmd_search(config: Config, query: &str, limit: usize, url: Option<String>) -> Result<()> {
    info!("Searching for: {}", query);

    let pipeline = prepare_pipeline(config, url).await?;
    let results = pipeline
        .retrieve(query, limit)
        .await
        .context("Search failed")?;

    if results.is_empty() {
        eprintln!("{}", format_warning("No matching chunks"));
        return Ok(());
    }

    println!("{}", format_heading(&format!("Top {} chunks", results.len())));
    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.format_summary(SOURCE_PREVIEW_CHARS));
    }

    Ok(())
}

async fn cmd_stats(config: &Config) -> Result<()> {
    info!("Gathering statistics");

    let store = VectorStore::open(&config.index, config.embedding.dimension)
        .await
        .context("Failed to open vector store")?;

    if !store.is_persistent() {
        warn!("Index backend is in-memory; statistics only cover this process");
    }

    let chunks = store.chunks().await?;
    let mut documents: Vec<&str> = chunks.iter().map(|c| c.document_hash.as_str()).collect();
    documents.sort_unstable();
    documents.dedup();
    let total_words: usize = chunks.iter().map(|c| c.word_count).sum();

    println!("{}", format_heading("Index statistics"));
    println!("Store: {}", store.describe());
    println!("Documents: {}", documents.len());
    println!("Chunks: {}", chunks.len());
    println!("Words: {}", total_words);

    Ok(())
}

async fn cmd_verify(config: &Config) -> Result<()> {
    info!("Verifying configuration and endpoints");
    let mut checks = Vec::new();

    checks.push(HealthCheck::healthy("configuration", Duration::ZERO));

    let key_check = config.require_api_key().map(|_| ());
    checks.push(HealthCheck::from_result(
        "api key",
        key_check,
        |_| format!("{} is set", config.llm.api_key_env),
        Duration::ZERO,
    ));

    if let Ok(api_key) = config.require_api_key() {
        let start = Instant::now();
        let models = match ChatClient::new(&config.llm, api_key.to_string()) {
            Ok(client) => client.list_models().await,
            Err(e) => Err(e),
        };
        let model = config.llm.model.clone();
        checks.push(match models {
            Ok(models) if !models.iter().any(|m| m == &model) => HealthCheck::degraded(
                "llm endpoint",
                format!("{} not listed among {} models", model, models.len()),
                start.elapsed(),
            ),
            other => HealthCheck::from_result(
                "llm endpoint",
                other,
                |models| format!("{} models available, {} found", models.len(), model),
                start.elapsed(),
            ),
        });
    }

    let start = Instant::now();
    let embedding = match Embedder::from_config(config) {
        Ok(embedder) => embedder
            .embed_query("health check")
            .await
            .map(|vector| (embedder.describe(), vector.len())),
        Err(e) => Err(e),
    };
    checks.push(HealthCheck::from_result(
        "embeddings",
        embedding,
        |(name, dim)| format!("{} returned {} dimensions", name, dim),
        start.elapsed(),
    ));

    let start = Instant::now();
    let index = match VectorStore::open(&config.index, config.embedding.dimension).await {
        Ok(store) => store
            .len()
            .await
            .map(|count| (store.describe(), count)),
        Err(e) => Err(e),
    };
    checks.push(HealthCheck::from_result(
        "vector index",
        index,
        |(name, count)| format!("{} holds {} chunks", name, count),
        start.elapsed(),
    ));

    let report = HealthReport::new(checks, env!("CARGO_PKG_VERSION").to_string());
    println!("{}", report.format());

    if !report.is_healthy() {
        return Err(anyhow::anyhow!("Verification failed"));
    }

    eprintln!("{}", format_success("All checks passed"));
    Ok(())
}

async fn cmd_reset(config: &Config, confirm: bool) -> Result<()> {
    if !confirm {
        error!("This will delete all indexed chunks. Use --confirm to proceed");
        return Ok(());
    }

    warn!("Resetting vector index - all indexed chunks will be lost");

    let mut store = VectorStore::open(&config.index, config.embedding.dimension)
        .await
        .context("Failed to open vector store")?;
    store.reset().await.context("Failed to reset vector store")?;

    info!("Index reset complete ({})", store.describe());
    Ok(())
}

async fn cmd_export(
    config: Config,
    output: PathBuf,
    pretty: bool,
    url: Option<String>,
) -> Result<()> {
    info!("Initializing JSON export");

    let pipeline = prepare_pipeline(config, url).await?;
    let exporter = JsonExporter::new(output)?;
    let manifest = exporter.export_chunks(pipeline.store(), pretty).await?;

    eprintln!(
        "{}",
        format_success(&format!(
            "Exported {} chunks to {}",
            manifest.total_chunks,
            exporter.output_dir().display()
        ))
    );
    Ok(())
}

async fn cmd_mcp(config: Config, transport: &str) -> Result<()> {
    info!("Starting MCP server (transport: {})", transport);

    if transport != "stdio" {
        error!("Only stdio transport is currently supported");
        return Err(anyhow::anyhow!("Unsupported transport: {}", transport));
    }

    let pipeline = RagPipeline::new(config)
        .await
        .context("Failed to initialize pipeline")?;
    let mcp_server = PaperRagMcp::new(pipeline);

    info!("MCP server ready. Available tools:");
    for tool in mcp_server.get_tool_router().list_all() {
        info!(
            "  - {}: {}",
            tool.name,
            tool.description.as_deref().unwrap_or("No description")
        );
    }

    info!("Starting stdio transport...");
    let service = mcp_server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server")?;
    service.waiting().await?;

    Ok(())
}
