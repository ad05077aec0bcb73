//! RAG ingestion CLI
//!
//! Loads documents from a URL, file or directory, chunks and embeds them,
//! stores them in Qdrant and exports the lexical corpus for BM25 indexing.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rag_evaluator::{
    chunking::ChunkConfig,
    config::Config,
    ingest::{IngestSettings, Ingestor, export_corpus},
    llm::LlmClient,
    persistence::{default_corpus_path, save_corpus},
    source::load_source,
    store::{Distance, QdrantClient},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// RAG ingestion - chunk, embed and store documents in Qdrant
#[derive(Parser)]
#[command(name = "rag-ingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load environment variables from a dotenv file before anything else
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Service endpoints and credentials. Override the config file and environment.
#[derive(Args, Clone, Default)]
struct ConnectionArgs {
    /// Qdrant HTTP URL
    #[arg(long)]
    qdrant_url: Option<String>,

    /// Qdrant API key
    #[arg(long)]
    qdrant_api_key: Option<String>,

    /// OpenAI-compatible API key
    #[arg(long)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long)]
    openai_api_base: Option<String>,
}

impl ConnectionArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.qdrant_url {
            config.qdrant.url = url.clone();
        }
        if let Some(key) = &self.qdrant_api_key {
            config.qdrant.api_key = Some(key.clone());
        }
        if let Some(key) = &self.openai_api_key {
            config.llm.api_key = key.clone();
        }
        if let Some(base) = &self.openai_api_base {
            config.llm.api_base = base.clone();
        }
    }
}

#[derive(Args)]
struct IngestArgs {
    /// Path, directory or URL of the corpus to ingest
    #[arg(long)]
    source: String,

    /// Qdrant collection to create or extend
    #[arg(long, default_value = "rag_data")]
    collection: String,

    /// Embedding batch size
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Vector distance metric for a new collection
    #[arg(long, value_enum, default_value_t = Distance::Cosine)]
    distance: Distance,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = 50)]
    chunk_overlap: usize,

    /// Embedding model (defaults to the configured one)
    #[arg(long)]
    vector_model: Option<String>,

    /// Add an LLM summary point for every long chunk
    #[arg(long)]
    generate_summaries: bool,

    /// Chat model used for summaries
    #[arg(long, default_value = "gpt-4.1-nano")]
    summary_model: String,

    /// Warn about chunks with out-of-bounds word counts
    #[arg(long)]
    quality_checks: bool,

    /// Derive point ids from content and metadata so re-ingesting overwrites
    #[arg(long)]
    deterministic_ids: bool,

    /// Lexical corpus output path (default: <collection>_bm25_index.json)
    #[arg(long)]
    bm25_index: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a corpus into a Qdrant collection
    Ingest(IngestArgs),

    /// Export the lexical corpus of an existing collection
    ExportBm25 {
        /// Qdrant collection to export
        #[arg(long)]
        collection: String,

        /// Output path (default: <collection>_bm25_index.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Test LLM and Qdrant connections
    Test {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let env_file = cli.env_file.as_deref();

    match cli.command {
        Commands::Ingest(args) => cmd_ingest(args, env_file).await,
        Commands::ExportBm25 {
            collection,
            output,
            connection,
        } => cmd_export(collection, output, &connection, env_file).await,
        Commands::Test { connection } => cmd_test(&connection, env_file).await,
    }
}

fn load_config(env_file: Option<&Path>, connection: &ConnectionArgs) -> Result<Config> {
    if let Some(path) = env_file {
        Config::load_env_file(path).context("Failed to load env file")?;
    }
    let mut config = Config::load().context("Failed to load configuration")?;
    connection.apply(&mut config);
    Ok(config)
}

async fn cmd_ingest(args: IngestArgs, env_file: Option<&Path>) -> Result<()> {
    let config = load_config(env_file, &args.connection)?;
    config.validate().context("Invalid configuration")?;

    let chunk = ChunkConfig {
        chunk_size: args.chunk_size,
        chunk_overlap: args.chunk_overlap,
    };

    tracing::info!(
        source = %args.source,
        chunk_size = chunk.chunk_size,
        overlap = chunk.chunk_overlap,
        "loading documents"
    );

    let start = Instant::now();
    let http = reqwest::Client::new();
    let docs = load_source(&args.source, &chunk, &http)
        .await
        .with_context(|| format!("Failed to load source '{}'", args.source))?;

    let llm = LlmClient::new(config.llm.clone());
    let qdrant = QdrantClient::new(config.qdrant.clone());

    let settings = IngestSettings {
        collection: args.collection,
        embedding_model: args.vector_model.unwrap_or(config.embedding.model),
        batch_size: args.batch_size,
        distance: args.distance,
        chunk,
        generate_summaries: args.generate_summaries,
        summary_model: args.summary_model,
        quality_checks: args.quality_checks,
        deterministic_ids: args.deterministic_ids,
        corpus_path: args.bm25_index,
    };

    let ingestor = Ingestor::new(&llm, &llm, &qdrant, settings);
    let report = ingestor
        .run(docs, &args.source)
        .await
        .context("Ingestion failed")?;

    println!("\nIngestion completed:");
    println!("  Collection:  {}", ingestor.settings().collection);
    println!("  Chunks:      {}", report.chunks);
    println!("  Summaries:   {}", report.summaries);
    println!("  Points:      {}", report.points);
    match &report.corpus_path {
        Some(path) => println!("  BM25 corpus: {} ({} entries)", path.display(), report.corpus_entries),
        None => println!("  BM25 corpus: not written (see warnings)"),
    }
    println!("  Time:        {:.2?}", start.elapsed());

    Ok(())
}

async fn cmd_export(
    collection: String,
    output: Option<PathBuf>,
    connection: &ConnectionArgs,
    env_file: Option<&Path>,
) -> Result<()> {
    let config = load_config(env_file, connection)?;
    let qdrant = QdrantClient::new(config.qdrant);

    let path = output.unwrap_or_else(|| default_corpus_path(&collection));
    let corpus = export_corpus(&qdrant, &collection)
        .await
        .with_context(|| format!("Failed to scroll collection '{}'", collection))?;
    save_corpus(&corpus, &path).context("Failed to write BM25 corpus")?;

    println!("BM25 corpus written to {} ({} entries)", path.display(), corpus.len());
    Ok(())
}

async fn cmd_test(connection: &ConnectionArgs, env_file: Option<&Path>) -> Result<()> {
    println!("Testing connections...\n");

    let config = load_config(env_file, connection)?;
    let key_prefix: String = config.llm.api_key.chars().take(8).collect();

    println!("Configuration:");
    println!("  API Base:   {}", config.llm.api_base);
    println!("  Model:      {}", config.llm.model);
    println!("  Embeddings: {}", config.embedding.model);
    println!("  API Key:    {}...", key_prefix);
    println!("  Qdrant:     {}", config.qdrant.url);
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);
    match client.test_connection().await {
        Ok(()) => println!("LLM connection successful!"),
        Err(e) => println!("LLM connection failed: {}", e),
    }

    let qdrant = QdrantClient::new(config.qdrant);
    match qdrant.list_collections().await {
        Ok(collections) => println!(
            "Qdrant connection successful! Collections: {}",
            collections.join(", ")
        ),
        Err(e) => println!("Qdrant connection failed: {}", e),
    }

    Ok(())
}
