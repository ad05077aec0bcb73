//! Persistence for the lexical corpus exported after ingestion.
//!
//! The corpus maps point ids to chunk text so an external BM25 index can be
//! built over exactly what was stored. Supports both JSON (human-readable)
//! and bincode (compact binary) formats.

use crate::error::{RagError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Point id to chunk text.
pub type LexicalCorpus = BTreeMap<String, String>;

/// Suffix of the default corpus filename.
pub const DEFAULT_CORPUS_SUFFIX: &str = "_bm25_index.json";

/// Default corpus path for a collection: `<collection>_bm25_index.json`.
pub fn default_corpus_path(collection: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", collection, DEFAULT_CORPUS_SUFFIX))
}

/// Save format for corpus files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Save a corpus, choosing the format from the extension.
pub fn save_corpus(corpus: &LexicalCorpus, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let data = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::to_string_pretty(corpus)
            .map_err(|e| RagError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => bincode::encode_to_vec(corpus, bincode::config::standard())
            .map_err(|e| RagError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))?;

    tracing::info!(path = %path.display(), entries = corpus.len(), "saved lexical corpus");
    Ok(())
}

/// Load a corpus saved by [`save_corpus`].
pub fn load_corpus(path: &Path) -> Result<LexicalCorpus> {
    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;

    match SaveFormat::from_path(path) {
        SaveFormat::Json => {
            serde_json::from_slice(&data).map_err(|e| RagError::Serialization(e.to_string()))
        }
        SaveFormat::Bincode => {
            let (corpus, _): (LexicalCorpus, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| RagError::Serialization(e.to_string()))?;
            Ok(corpus)
        }
    }
}
