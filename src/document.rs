//! Document representation for ingestion.
//!
//! A document is a piece of text plus free-form metadata. Sources load whole
//! documents, which are then split into chunk documents, annotated with
//! retrieval metadata, and finally stored as points.

use crate::chunking::{ChunkConfig, chunk_text};
use crate::error::{RagError, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use uuid::Uuid;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid date regex"));

/// Maximum characters kept for the `section` label.
const SECTION_MAX_CHARS: usize = 100;

/// A text document with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content.
    pub content: String,
    /// Metadata stored alongside the content.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Set a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Load a text file, recording its path as `source`.
    pub fn from_text_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Ok(Self::new(content).with_metadata("source", path.display().to_string()))
    }

    /// The `source` metadata value, if set.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// Whitespace-separated word count.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// Split into chunk documents that inherit this document's metadata.
    pub fn chunks(&self, config: &ChunkConfig) -> Vec<Document> {
        chunk_text(&self.content, config)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Document {
                content: text,
                metadata: self.metadata.clone(),
            }
            .with_metadata("chunk_index", index))
            .collect()
    }
}

/// First valid ISO calendar date in `text`.
pub fn detect_date(text: &str) -> Option<String> {
    ISO_DATE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| NaiveDate::parse_from_str(candidate, "%Y-%m-%d").is_ok())
        .map(str::to_string)
}

/// Annotate chunks with retrieval metadata. Existing keys are kept.
///
/// Adds `source`, `section` (first line), `neighbor_prev`/`neighbor_next`
/// (positions in `docs`, null at the ends) and `date` when one is found.
pub fn enrich(docs: &mut [Document], source: &str) {
    let last = docs.len().saturating_sub(1);

    for (idx, doc) in docs.iter_mut().enumerate() {
        let section: String = doc
            .content
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(SECTION_MAX_CHARS)
            .collect();
        let prev = if idx > 0 { Value::from(idx - 1) } else { Value::Null };
        let next = if idx < last { Value::from(idx + 1) } else { Value::Null };

        let meta = &mut doc.metadata;
        meta.entry("source").or_insert_with(|| Value::from(source));
        meta.entry("section").or_insert_with(|| Value::from(section));
        meta.entry("neighbor_prev").or_insert(prev);
        meta.entry("neighbor_next").or_insert(next);

        if !meta.contains_key("date") {
            if let Some(date) = detect_date(&doc.content) {
                meta.insert("date".to_string(), Value::from(date));
            }
        }
    }
}

/// Describe chunks whose word count is outside `[chunk_overlap, 2 * chunk_size]`.
pub fn quality_warnings(docs: &[Document], config: &ChunkConfig) -> Vec<String> {
    let upper = config.chunk_size * 2;

    docs.iter()
        .filter_map(|doc| {
            let words = doc.word_count();
            if words < config.chunk_overlap || words > upper {
                let index = doc
                    .metadata
                    .get("chunk_index")
                    .map(Value::to_string)
                    .unwrap_or_else(|| "?".to_string());
                Some(format!(
                    "Chunk index={} word_count={} out of bounds (<{} or >{})",
                    index, words, config.chunk_overlap, upper
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Point id for a document.
///
/// Deterministic ids are UUIDv5 (URL namespace) over the key-sorted metadata
/// JSON, a newline and the content, so re-ingesting the same chunk overwrites
/// it. Otherwise a random UUIDv4.
pub fn point_id(doc: &Document, deterministic: bool) -> String {
    if !deterministic {
        return Uuid::new_v4().to_string();
    }

    let sorted: BTreeMap<&String, &Value> = doc.metadata.iter().collect();
    let meta = serde_json::to_string(&sorted).unwrap_or_default();
    let name = format!("{}\n{}", meta, doc.content);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunks_inherit_metadata() {
        let doc = Document::new("First.\n\nSecond.").with_metadata("source", "a.md");
        let config = ChunkConfig {
            chunk_size: 8,
            chunk_overlap: 0,
        };
        let chunks = doc.chunks(&config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "Second.");
        assert_eq!(chunks[1].source(), Some("a.md"));
        assert_eq!(chunks[1].metadata["chunk_index"], json!(1));
    }

    #[test]
    fn test_enrich_sets_neighbors_and_section() {
        let mut docs = vec![
            Document::new("Intro line\nbody"),
            Document::new("Middle"),
            Document::new("Release 2024-02-30 slipped to 2024-03-01").with_metadata("source", "kept"),
        ];
        enrich(&mut docs, "corpus/");

        assert_eq!(docs[0].metadata["section"], json!("Intro line"));
        assert_eq!(docs[0].metadata["neighbor_prev"], Value::Null);
        assert_eq!(docs[0].metadata["neighbor_next"], json!(1));
        assert_eq!(docs[1].metadata["neighbor_prev"], json!(0));
        assert_eq!(docs[2].metadata["neighbor_next"], Value::Null);
        assert_eq!(docs[0].source(), Some("corpus/"));
        assert_eq!(docs[2].source(), Some("kept"));
        assert_eq!(docs[2].metadata["date"], json!("2024-03-01"));
        assert!(!docs[1].metadata.contains_key("date"));
    }

    #[test]
    fn test_section_is_truncated() {
        let mut docs = vec![Document::new("x".repeat(150))];
        enrich(&mut docs, "s");
        assert_eq!(docs[0].metadata["section"].as_str().unwrap().len(), 100);
    }

    #[test]
    fn test_detect_date() {
        assert_eq!(detect_date("on 2023-12-31."), Some("2023-12-31".to_string()));
        assert_eq!(detect_date("build 12023-12-31"), None);
        assert_eq!(detect_date("2023-13-01"), None);
    }

    #[test]
    fn test_quality_warnings() {
        let config = ChunkConfig {
            chunk_size: 3,
            chunk_overlap: 2,
        };
        let docs = vec![
            Document::new("one").with_metadata("chunk_index", 0),
            Document::new("one two three").with_metadata("chunk_index", 1),
            Document::new("a b c d e f g").with_metadata("chunk_index", 2),
        ];
        let warnings = quality_warnings(&docs, &config);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("index=0"));
        assert!(warnings[1].contains("word_count=7"));
    }

    #[test]
    fn test_deterministic_point_ids() {
        let a = Document::new("text")
            .with_metadata("source", "a")
            .with_metadata("chunk_index", 0);
        let b = Document::new("text")
            .with_metadata("chunk_index", 0)
            .with_metadata("source", "a");

        let id = point_id(&a, true);
        assert_eq!(id, point_id(&b, true));
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 5);

        let other = Document::new("other text").with_metadata("source", "a");
        assert_ne!(id, point_id(&other, true));
        assert_ne!(point_id(&a, false), point_id(&a, false));
    }
}
