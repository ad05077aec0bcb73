//! Evaluation CLI: run labeled test cases through retrieval and generation
//! and score them with every configured framework.
//!
//! Usage:
//!   rag-eval --test-file tests.jsonl --collection rag_data
//!
//! Options:
//!   -f, --framework <NAME>   # ragas, cj or langgraph (repeatable, default all)
//!   --k <N>                  # Contexts to retrieve (default: 100)
//!   --no-hybrid              # Plain vector search
//!   --alpha <A>              # Vector weight for hybrid search (default: 0.35)
//!   --llm-model ""           # Skip answer generation
//!   --max-cases <N>          # Limit number of cases
//!   --output <path>          # Save the full report as JSON

use anyhow::{Context, Result, ensure};
use clap::Parser;
use rag_evaluator::config::Config;
use rag_evaluator::eval::{
    EvaluationRun, EvaluatorRegistry, Framework, RetrievalSettings, load_test_cases,
};
use rag_evaluator::llm::LlmClient;
use rag_evaluator::store::QdrantClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(about = "Evaluate a RAG pipeline with multiple judge frameworks", long_about = None)]
struct Cli {
    /// JSONL file with test cases: {"query", "ground_truth", "relevant_doc_ids"}
    #[arg(long)]
    test_file: PathBuf,

    /// Qdrant collection name
    #[arg(long)]
    collection: String,

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

    /// Embedding model (defaults to the configured one)
    #[arg(long)]
    vector_model: Option<String>,

    /// Chat model for answer generation (empty to skip)
    #[arg(long, default_value = "gpt-4.1-mini")]
    llm_model: String,

    /// Chat model the judges use (defaults to the configured LLM model)
    #[arg(long)]
    judge_model: Option<String>,

    /// Number of contexts to retrieve
    #[arg(long, default_value_t = 100)]
    k: usize,

    /// Blend lexical and vector ranking (default)
    #[arg(long, overrides_with = "no_hybrid")]
    hybrid: bool,

    /// Plain vector search
    #[arg(long, overrides_with = "hybrid")]
    no_hybrid: bool,

    /// Weight for the vector score in hybrid retrieval
    #[arg(long, default_value_t = 0.35, value_parser = parse_alpha)]
    alpha: f32,

    /// Evaluation frameworks to run (default: all)
    #[arg(short = 'f', long = "framework", value_enum)]
    frameworks: Vec<Framework>,

    /// Maximum number of cases to evaluate
    #[arg(long)]
    max_cases: Option<usize>,

    /// Save the full report to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Load environment variables from a dotenv file first
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn hybrid(&self) -> bool {
        self.hybrid || !self.no_hybrid
    }

    /// Selected frameworks in command-line order, without repeats.
    fn framework_names(&self) -> Vec<String> {
        let selected: &[Framework] = if self.frameworks.is_empty() {
            &Framework::ALL
        } else {
            &self.frameworks
        };

        let mut names: Vec<String> = Vec::new();
        for framework in selected {
            let name = framework.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

fn parse_alpha(s: &str) -> std::result::Result<f32, String> {
    let alpha: f32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&alpha) {
        Ok(alpha)
    } else {
        Err(format!("alpha must be within [0, 1], got {}", alpha))
    }
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
        error!(error = %err, "evaluation failed");
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
    ensure!(
        cli.test_file.is_file(),
        "Test file not found: {}",
        cli.test_file.display()
    );

    if let Some(path) = &cli.env_file {
        Config::load_env_file(path).context("Failed to load env file")?;
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    let judge_model = cli
        .judge_model
        .clone()
        .unwrap_or_else(|| config.llm.model.clone());

    if let Some(url) = &cli.qdrant_url {
        config.qdrant.url = url.clone();
    }
    if let Some(key) = &cli.qdrant_api_key {
        config.qdrant.api_key = Some(key.clone());
    }
    if let Some(key) = &cli.openai_api_key {
        config.llm.api_key = key.clone();
    }
    if let Some(base) = &cli.openai_api_base {
        config.llm.api_base = base.clone();
    }
    config.llm.model = cli.llm_model.clone();
    config.validate().context("Invalid configuration")?;

    let mut cases = load_test_cases(&cli.test_file).context("Failed to load test cases")?;
    if let Some(max) = cli.max_cases {
        cases.truncate(max);
    }

    let settings = RetrievalSettings {
        collection: cli.collection.clone(),
        vector_model: cli
            .vector_model
            .clone()
            .unwrap_or_else(|| config.embedding.model.clone()),
        llm_model: cli.llm_model.clone(),
        k: cli.k,
        hybrid: cli.hybrid(),
        alpha: cli.alpha,
    };
    let frameworks = cli.framework_names();

    tracing::info!(
        api_base = %config.llm.api_base,
        llm_model = %settings.llm_model,
        judge_model = %judge_model,
        hybrid = settings.hybrid,
        k = settings.k,
        "configuration loaded"
    );

    let llm = LlmClient::new(config.llm.clone());
    let qdrant = QdrantClient::new(config.qdrant.clone());
    let registry = EvaluatorRegistry::with_judges(Arc::new(llm.clone()), &judge_model);

    let run = EvaluationRun::new(&llm, &qdrant, &llm, &registry, settings, frameworks);
    let report = run.run(&cases).await.context("Evaluation run failed")?;

    report.print_summary();
    tracing::info!(seconds = report.total_time_secs, "evaluation finished");

    if let Some(path) = &cli.output {
        report.save_json(path).context("Failed to save report")?;
        tracing::info!(path = %path.display(), "report saved");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_bounds() {
        assert_eq!(parse_alpha("0.35"), Ok(0.35));
        assert_eq!(parse_alpha("1"), Ok(1.0));
        assert!(parse_alpha("1.5").is_err());
        assert!(parse_alpha("-0.1").is_err());
        assert!(parse_alpha("abc").is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["rag-eval", "--test-file", "t.jsonl", "--collection", "docs"]);
        assert!(cli.hybrid());
        assert_eq!(cli.k, 100);
        assert_eq!(cli.llm_model, "gpt-4.1-mini");
        assert_eq!(cli.framework_names(), vec!["ragas", "cj", "langgraph"]);
    }

    #[test]
    fn test_hybrid_toggle_and_frameworks() {
        let cli = Cli::parse_from([
            "rag-eval", "--test-file", "t.jsonl", "--collection", "docs", "--no-hybrid", "-f", "cj",
            "-f", "ragas", "-f", "cj", "--llm-model", "",
        ]);
        assert!(!cli.hybrid());
        assert_eq!(cli.framework_names(), vec!["cj", "ragas"]);
        assert!(cli.llm_model.is_empty());

        let cli = Cli::parse_from([
            "rag-eval", "--test-file", "t.jsonl", "--collection", "docs", "--no-hybrid", "--hybrid",
        ]);
        assert!(cli.hybrid());
    }

    #[test]
    fn test_unknown_framework_rejected() {
        let result = Cli::try_parse_from([
            "rag-eval", "--test-file", "t.jsonl", "--collection", "docs", "-f", "bleu",
        ]);
        assert!(result.is_err());
    }
}
