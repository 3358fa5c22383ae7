mod config;
mod posts;

use clap::{Parser, Subcommand, ValueEnum};
use config::{EmbedderKind, RagpressConfig};
use ragpress_agent::{
    LlmClient, OpenAiEmbedding, RagPipeline, SearchPostsTool, ToolRegistry, ToolRunner,
};
use ragpress_core::{Query, RagpressResult};
use ragpress_memory::{
    embed_documents, sync_documents, DocumentStore, EmbeddingProvider, LocalEmbedding, Retriever,
    SearchMode, SqliteDocumentStore,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragpress", about = "Ask questions about your site's posts")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ragpress.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import posts from a JSON export into the store
    Sync {
        /// JSON array of posts
        #[arg(short, long)]
        file: PathBuf,
        /// Delete stored posts that are not in the export
        #[arg(long)]
        prune: bool,
    },
    /// Compute embeddings for posts that lack one
    Embed {
        /// Re-embed every post
        #[arg(long)]
        force: bool,
    },
    /// Search posts and print the ranked results as JSON
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Overrides [retrieval].mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Answer a question from the site's posts
    Ask {
        question: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Chat with a model that can call the search_posts tool
    Chat { prompt: String },
    /// Print the effective configuration (API key masked)
    Config,
    /// Print document and embedding counts
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Lexical,
    Vector,
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lexical => SearchMode::Lexical,
            ModeArg::Vector => SearchMode::Vector,
            ModeArg::Hybrid => SearchMode::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = RagpressConfig::load(&cli.config, std::env::var("OPENAI_API_KEY").ok()).await?;

    if let Err(e) = run(cli.command, config).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, config: RagpressConfig) -> RagpressResult<()> {
    match command {
        Commands::Sync { file, prune } => {
            let export = tokio::fs::read_to_string(&file).await?;
            let documents = posts::parse_posts(&export)?;
            info!(file = %file.display(), posts = documents.len(), "Syncing posts");

            let store = open_store(&config)?;
            let report = sync_documents(store.as_ref(), documents, prune).await?;
            print_json(&report)?;
        }

        Commands::Embed { force } => {
            let store = open_store(&config)?;
            let embedder = build_embedder(&config)?;
            let report = embed_documents(
                store.as_ref(),
                embedder.as_ref(),
                force,
                config.store.embed_batch_size,
            )
            .await?;
            print_json(&report)?;
        }

        Commands::Search { query, limit, mode } => {
            let retriever = build_retriever(&config)?;
            let query = Query::new(query, limit.unwrap_or(config.retrieval.default_limit));
            let mode = mode.map(SearchMode::from).unwrap_or(retriever.mode());
            let retrieval = retriever.retrieve_with_mode(&query, mode).await?;
            print_json(&json!({
                "vector_used": retrieval.vector_used,
                "results": retrieval.results,
            }))?;
        }

        Commands::Ask { question, limit } => {
            let retriever = Arc::new(build_retriever(&config)?);
            let llm = LlmClient::new(config.model.clone())?;
            let rag = RagPipeline::new(retriever, llm)
                .with_context_builder(config.retrieval.context_builder());
            let answer = rag
                .answer(&question, limit.unwrap_or(config.retrieval.default_limit))
                .await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    println!("- [{}] {}", source.document_id, source.title);
                }
            }
        }

        Commands::Chat { prompt } => {
            let retriever = Arc::new(build_retriever(&config)?);
            let mut tools = ToolRegistry::new();
            tools.register(Arc::new(SearchPostsTool::new(retriever)));

            let llm = LlmClient::new(config.model.clone())?;
            let runner = ToolRunner::new(llm, Arc::new(tools), config.model.max_turns);
            println!("{}", runner.run(&prompt).await?);
        }

        Commands::Config => {
            print!("{}", config.to_masked_toml()?);
        }

        Commands::Stats => {
            let store = open_store(&config)?;
            let documents = store.count().await?;
            let embedded = store.embedded_count().await?;
            print_json(&json!({
                "store": config.store.path.display().to_string(),
                "documents": documents,
                "embedded": embedded,
                "pending_embeddings": documents.saturating_sub(embedded),
            }))?;
        }
    }
    Ok(())
}

fn open_store(config: &RagpressConfig) -> RagpressResult<Arc<SqliteDocumentStore>> {
    Ok(Arc::new(SqliteDocumentStore::open(&config.store.path)?))
}

fn build_embedder(config: &RagpressConfig) -> RagpressResult<Arc<dyn EmbeddingProvider>> {
    Ok(match config.retrieval.embedder {
        EmbedderKind::OpenAi => Arc::new(OpenAiEmbedding::new(config.model.clone())?),
        EmbedderKind::Local => Arc::new(LocalEmbedding::new(config.model.embedding_dimension)),
    })
}

fn build_retriever(config: &RagpressConfig) -> RagpressResult<Retriever> {
    let store = open_store(config)?;
    let embedder = build_embedder(config)?;
    Ok(Retriever::new(store.clone(), store, embedder)
        .with_mode(config.retrieval.mode)
        .with_fusion(config.retrieval.fusion))
}

fn print_json<T: serde::Serialize>(value: &T) -> RagpressResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
