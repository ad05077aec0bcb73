//! Vector database access.
//!
//! The pipeline only needs [`VectorSearch`]; ingestion needs [`PointStore`].
//! [`QdrantClient`] implements both over Qdrant's REST API.

mod qdrant;

pub use qdrant::QdrantClient;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload keys checked, in order, for a hit's passage text.
pub const CONTENT_FIELDS: [&str; 2] = ["chunk_text", "text"];

/// A single retrieved record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Point id as stored by the database.
    pub id: String,
    /// Relevance score, highest first.
    pub score: f32,
    /// Stored payload.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Hit {
    /// Passage text: `chunk_text`, then `text`, else empty.
    pub fn content(&self) -> &str {
        CONTENT_FIELDS
            .iter()
            .filter_map(|key| self.payload.get(*key).and_then(Value::as_str))
            .find(|text| !text.is_empty())
            .unwrap_or("")
    }

    /// Identifiers a labeled relevant document may refer to.
    pub fn doc_ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        for key in ["doc_id", "source"] {
            match self.payload.get(key) {
                Some(Value::String(s)) if !s.is_empty() => ids.push(s.clone()),
                Some(Value::Number(n)) => ids.push(n.to_string()),
                _ => {}
            }
        }
        ids
    }
}

/// Lexical weighting for a hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridParams {
    /// Query text for the lexical ranking.
    pub query_text: String,
    /// Weight of the vector score; the lexical score gets `1 - alpha`.
    pub alpha: f32,
}

/// One similarity search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub collection: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    /// Present when a blended lexical + vector ranking is requested.
    pub hybrid: Option<HybridParams>,
}

impl SearchRequest {
    /// Plain vector search.
    pub fn vector(collection: impl Into<String>, vector: Vec<f32>, limit: usize) -> Self {
        Self {
            collection: collection.into(),
            vector,
            limit,
            hybrid: None,
        }
    }

    /// Attach hybrid parameters.
    pub fn with_hybrid(mut self, query_text: impl Into<String>, alpha: f32) -> Self {
        self.hybrid = Some(HybridParams {
            query_text: query_text.into(),
            alpha,
        });
        self
    }

    /// The same request without hybrid parameters.
    pub fn without_hybrid(&self) -> Self {
        Self {
            hybrid: None,
            ..self.clone()
        }
    }
}

/// Similarity search capability.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return hits ordered by relevance, highest first.
    ///
    /// A backend that cannot serve the hybrid form of a request must answer
    /// [`RagError::Unsupported`](crate::RagError::Unsupported).
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>>;
}

/// Vector distance metric for a new collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    /// Name used by the Qdrant API.
    pub fn as_qdrant(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

/// A point to upsert.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// One page of a collection scan.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<Hit>,
    /// Offset for the next page; `None` when the scan is complete.
    pub next_offset: Option<Value>,
}

/// Collection management and bulk writes.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Create `name` unless it exists. Returns whether it was created.
    async fn ensure_collection(&self, name: &str, size: usize, distance: Distance) -> Result<bool>;

    /// Insert or replace points.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Read one page of points with payloads.
    async fn scroll(&self, collection: &str, limit: usize, offset: Option<Value>)
    -> Result<ScrollPage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(payload: Value) -> Hit {
        Hit {
            id: "p1".to_string(),
            score: 0.9,
            payload: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_content_prefers_chunk_text() {
        assert_eq!(hit(json!({"chunk_text": "a", "text": "b"})).content(), "a");
        assert_eq!(hit(json!({"chunk_text": "", "text": "b"})).content(), "b");
        assert_eq!(hit(json!({"text": "b"})).content(), "b");
        assert_eq!(hit(json!({"chunk_text": 5})).content(), "");
        assert_eq!(hit(json!({})).content(), "");
    }

    #[test]
    fn test_doc_ids() {
        let ids = hit(json!({"doc_id": "doc1", "source": "a.md"})).doc_ids();
        assert_eq!(ids, vec!["p1", "doc1", "a.md"]);
        assert_eq!(hit(json!({"doc_id": 7})).doc_ids(), vec!["p1", "7"]);
    }

    #[test]
    fn test_without_hybrid_keeps_limit() {
        let request = SearchRequest::vector("c", vec![0.1], 4).with_hybrid("q", 0.35);
        assert!(request.hybrid.is_some());
        let plain = request.without_hybrid();
        assert!(plain.hybrid.is_none());
        assert_eq!(plain.limit, 4);
        assert_eq!(plain.collection, "c");
    }
}
