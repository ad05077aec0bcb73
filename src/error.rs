//! Error types for ingestion and evaluation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while ingesting or evaluating.
#[derive(Error, Debug)]
pub enum RagError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Embedding API returned something unusable.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector database error.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// The backend rejected a request shape it does not support.
    #[error("Operation not supported by backend: {0}")]
    Unsupported(String),

    /// Malformed test case file.
    #[error("Invalid test case at line {line}: {message}")]
    Dataset { line: usize, message: String },

    /// The ingestion source does not exist.
    #[error("Source not found at '{0}'")]
    SourceNotFound(PathBuf),

    /// No ingestible documents found under a source.
    #[error("No documents found in source '{0}'")]
    EmptyCorpus(PathBuf),

    /// An evaluator could not produce a score.
    #[error("Evaluator error: {0}")]
    Evaluator(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the backend's "unsupported request" signal.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RagError::Unsupported(_))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::LlmParse(err.to_string())
    }
}
