//! Qdrant REST client.

use super::{Distance, Hit, Point, PointStore, ScrollPage, SearchRequest, VectorSearch};
use crate::config::QdrantConfig;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Envelope around every Qdrant REST result.
#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

/// Qdrant error body: `{"status": {"error": "..."}}`.
#[derive(Debug, Deserialize)]
struct QdrantErrorBody {
    status: QdrantErrorStatus,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorStatus {
    error: String,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScoredPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

impl From<ScoredPoint> for Hit {
    fn from(point: ScoredPoint) -> Self {
        let id = match point.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Hit {
            id,
            score: point.score,
            payload: point.payload.unwrap_or_default(),
        }
    }
}

/// Whether a failed response is Qdrant refusing a request shape it does not know.
fn is_capability_rejection(status: StatusCode, body: &str) -> bool {
    if !matches!(status.as_u16(), 400 | 404 | 422) {
        return false;
    }
    let body = body.to_lowercase();
    ["unknown field", "unknown variant", "not supported", "unsupported"]
        .iter()
        .any(|marker| body.contains(marker))
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<QdrantErrorBody>(body) {
        Ok(parsed) => format!("Qdrant error ({}): {}", status, parsed.status.error),
        Err(_) => format!("Qdrant request failed ({}): {}", status, body),
    }
}

/// HTTP client for a Qdrant server.
#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    config: QdrantConfig,
}

impl QdrantClient {
    /// Create a new client for the configured server.
    pub fn new(config: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Server URL extended by `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| RagError::Config(format!("Invalid Qdrant URL '{}': {}", self.config.url, e)))?;
        url.path_segments_mut()
            .map_err(|_| RagError::Config(format!("Qdrant URL cannot have a path: {}", self.config.url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.api_key {
            Some(key) if !key.is_empty() => builder.header("api-key", key),
            _ => builder,
        }
    }

    /// Send a request and decode the `result` field, or return the failure status and body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<std::result::Result<T, (StatusCode, String)>> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Ok(Err((status, body)));
        }

        let parsed: QdrantResponse<T> = serde_json::from_str(&body)
            .map_err(|e| RagError::VectorStore(format!("Unexpected Qdrant response: {}", e)))?;
        Ok(Ok(parsed.result))
    }

    async fn send_ok<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.send(builder)
            .await?
            .map_err(|(status, body)| RagError::VectorStore(error_message(status, &body)))
    }

    /// Names of all collections. Doubles as a connectivity check.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let result: CollectionsResult = self
            .send_ok(self.request(Method::GET, self.endpoint(&["collections"])?))
            .await?;
        Ok(result.collections.into_iter().map(|c| c.name).collect())
    }

    /// Whether `name` exists.
    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_collections().await?.iter().any(|c| c == name))
    }

    fn search_body(request: &SearchRequest) -> Value {
        let mut body = json!({
            "vector": request.vector,
            "limit": request.limit,
            "with_payload": true,
        });

        if let Some(hybrid) = &request.hybrid {
            body["search_type"] = json!("hybrid");
            body["query_text"] = json!(hybrid.query_text);
            body["params"] = json!({ "hybrid": { "alpha": hybrid.alpha } });
        }

        body
    }
}

#[async_trait]
impl VectorSearch for QdrantClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>> {
        let url = self.endpoint(&["collections", request.collection.as_str(), "points", "search"])?;
        let builder = self
            .request(Method::POST, url)
            .json(&Self::search_body(request));

        match self.send::<Vec<ScoredPoint>>(builder).await? {
            Ok(points) => Ok(points.into_iter().map(Hit::from).collect()),
            Err((status, body)) if request.hybrid.is_some() && is_capability_rejection(status, &body) => {
                Err(RagError::Unsupported(error_message(status, &body)))
            }
            Err((status, body)) => Err(RagError::VectorStore(error_message(status, &body))),
        }
    }
}

#[async_trait]
impl PointStore for QdrantClient {
    async fn ensure_collection(&self, name: &str, size: usize, distance: Distance) -> Result<bool> {
        if self.collection_exists(name).await? {
            return Ok(false);
        }

        tracing::info!(collection = name, size, distance = distance.as_qdrant(), "creating collection");

        let body = json!({
            "vectors": { "size": size, "distance": distance.as_qdrant() }
        });
        let _: Value = self
            .send_ok(self.request(Method::PUT, self.endpoint(&["collections", name])?).json(&body))
            .await?;

        Ok(true)
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut url = self.endpoint(&["collections", collection, "points"])?;
        url.set_query(Some("wait=true"));
        let body = json!({ "points": points });
        let _: Value = self
            .send_ok(self.request(Method::PUT, url).json(&body))
            .await?;
        Ok(())
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Value>,
    ) -> Result<ScrollPage> {
        let url = self.endpoint(&["collections", collection, "points", "scroll"])?;
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(offset) = offset {
            body["offset"] = offset;
        }

        let result: ScrollResult = self
            .send_ok(self.request(Method::POST, url).json(&body))
            .await?;

        Ok(ScrollPage {
            points: result.points.into_iter().map(Hit::from).collect(),
            next_offset: result.next_page_offset.filter(|v| !v.is_null()),
        })
    }
}
