//! RAG Evaluator - ingest documents into a vector database and measure how
//! well retrieval-augmented generation answers questions over them.
//!
//! # Overview
//!
//! Ingestion turns a URL, file or directory into chunks, annotates them with
//! retrieval metadata, embeds them with an OpenAI-compatible API and upserts
//! them into Qdrant. Evaluation runs each labeled test case through the same
//! retrieval (optionally hybrid lexical + vector) and answer generation, then
//! scores the result with every configured framework.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_evaluator::{
//!     config::Config,
//!     eval::{EvaluationRun, EvaluatorRegistry, Framework, RetrievalSettings, load_test_cases},
//!     llm::LlmClient,
//!     store::QdrantClient,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let llm = LlmClient::new(config.llm.clone());
//!     let qdrant = QdrantClient::new(config.qdrant.clone());
//!     let registry = EvaluatorRegistry::with_judges(Arc::new(llm.clone()), &config.llm.model);
//!
//!     let settings = RetrievalSettings {
//!         collection: "rag_data".to_string(),
//!         ..Default::default()
//!     };
//!     let frameworks = Framework::ALL.iter().map(|f| f.to_string()).collect();
//!
//!     let cases = load_test_cases(Path::new("tests.jsonl"))?;
//!     let run = EvaluationRun::new(&llm, &qdrant, &llm, &registry, settings, frameworks);
//!     run.run(&cases).await?.print_summary();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **llm**: OpenAI-compatible chat and embedding client, prompts
//! - **store**: vector search and point storage over Qdrant's REST API
//! - **chunking** / **document** / **source**: turning sources into chunks
//! - **ingest**: embedding, upserting and exporting the lexical corpus
//! - **eval**: pipeline, evaluators, score board and run reports

pub mod chunking;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod llm;
pub mod persistence;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use chunking::ChunkConfig;
pub use config::Config;
pub use document::Document;
pub use error::{RagError, Result};
pub use eval::{EvaluationRun, EvaluatorRegistry, Framework, RunReport, TestCase};
pub use ingest::{IngestSettings, Ingestor};
pub use llm::LlmClient;
pub use persistence::{load_corpus, save_corpus};
pub use store::QdrantClient;
