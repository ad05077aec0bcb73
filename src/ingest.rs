//! Ingestion: chunks in, embedded points out.
//!
//! The [`Ingestor`] annotates chunks, optionally adds LLM summaries, embeds
//! in batches, upserts into the vector store and finally exports the
//! lexical corpus of everything the collection holds.

use crate::chunking::ChunkConfig;
use crate::document::{self, Document};
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Embedder, Message, Prompts, fill};
use crate::persistence::{self, LexicalCorpus};
use crate::store::{Distance, Point, PointStore};
use serde_json::Value;
use std::path::PathBuf;

/// Chunks shorter than this are not summarized.
pub const MIN_SUMMARY_CHARS: usize = 200;

/// Points per scroll page during corpus export.
pub const SCROLL_PAGE_SIZE: usize = 1000;

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub collection: String,
    pub embedding_model: String,
    pub batch_size: usize,
    pub distance: Distance,
    pub chunk: ChunkConfig,
    pub generate_summaries: bool,
    pub summary_model: String,
    pub quality_checks: bool,
    pub deterministic_ids: bool,
    /// Corpus output; defaults to `<collection>_bm25_index.json`. A failed
    /// write is logged and leaves `IngestReport::corpus_path` unset.
    pub corpus_path: Option<PathBuf>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            collection: "rag_data".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            batch_size: 100,
            distance: Distance::Cosine,
            chunk: ChunkConfig::default(),
            generate_summaries: false,
            summary_model: "gpt-4.1-nano".to_string(),
            quality_checks: false,
            deterministic_ids: false,
            corpus_path: None,
        }
    }
}

impl IngestSettings {
    /// Where the lexical corpus is written.
    pub fn corpus_path(&self) -> PathBuf {
        self.corpus_path
            .clone()
            .unwrap_or_else(|| persistence::default_corpus_path(&self.collection))
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub chunks: usize,
    pub summaries: usize,
    pub points: usize,
    pub collection_created: bool,
    pub corpus_entries: usize,
    pub corpus_path: Option<PathBuf>,
}

/// Drives ingestion against injected model and store capabilities.
pub struct Ingestor<'a> {
    embedder: &'a dyn Embedder,
    chat: &'a dyn ChatModel,
    store: &'a dyn PointStore,
    settings: IngestSettings,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        chat: &'a dyn ChatModel,
        store: &'a dyn PointStore,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            chat,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Ingest already-chunked documents loaded from `source`.
    pub async fn run(&self, mut docs: Vec<Document>, source: &str) -> Result<IngestReport> {
        let mut report = IngestReport {
            chunks: docs.len(),
            ..Default::default()
        };

        if docs.is_empty() {
            tracing::warn!(source, "no documents found, nothing to do");
            return Ok(report);
        }

        document::enrich(&mut docs, source);

        if self.settings.quality_checks {
            for warning in document::quality_warnings(&docs, &self.settings.chunk) {
                tracing::warn!("{}", warning);
            }
        }

        if self.settings.generate_summaries {
            let summaries = self.summarize(&docs).await;
            report.summaries = summaries.len();
            docs.extend(summaries);
        }

        let (points, created) = self.embed_and_upsert(&docs).await?;
        report.points = points;
        report.collection_created = created;

        tracing::info!(
            collection = %self.settings.collection,
            points,
            "ingestion completed"
        );

        let path = self.settings.corpus_path();
        let corpus = export_corpus(self.store, &self.settings.collection).await?;
        report.corpus_entries = corpus.len();
        match persistence::save_corpus(&corpus, &path) {
            Ok(()) => report.corpus_path = Some(path),
            Err(e) => tracing::warn!(error = %e, "failed to write BM25 corpus, points are stored"),
        }

        Ok(report)
    }

    /// Summary documents for every chunk long enough to summarize.
    ///
    /// A failed summary is logged and skipped.
    pub async fn summarize(&self, docs: &[Document]) -> Vec<Document> {
        let mut summaries = Vec::new();

        tracing::info!(chunks = docs.len(), model = %self.settings.summary_model, "generating summaries");

        for doc in docs {
            if doc.content.chars().count() < MIN_SUMMARY_CHARS {
                continue;
            }

            let messages = vec![
                Message::system(Prompts::system_assistant()),
                Message::user(fill(Prompts::chunk_summary(), &[("content", doc.content.as_str())])),
            ];

            match self
                .chat
                .chat_completion(&self.settings.summary_model, messages)
                .await
            {
                Ok(response) => {
                    let mut summary = Document::new(response.content.trim());
                    summary.metadata = doc.metadata.clone();
                    summary
                        .metadata
                        .insert("is_summary".to_string(), Value::Bool(true));
                    summaries.push(summary);
                }
                Err(e) => tracing::warn!(error = %e, "summary generation failed"),
            }
        }

        summaries
    }

    /// Embed `docs` in batches and upsert them. Returns points written and
    /// whether the collection had to be created.
    pub async fn embed_and_upsert(&self, docs: &[Document]) -> Result<(usize, bool)> {
        let batch_size = self.settings.batch_size.max(1);
        let collection = &self.settings.collection;
        let total_batches = docs.len().div_ceil(batch_size);
        let mut created = false;
        let mut written = 0;

        for (batch_no, batch) in docs.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = self
                .embedder
                .embed(&self.settings.embedding_model, &texts)
                .await?;

            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            if batch_no == 0 {
                let size = vectors.first().map(Vec::len).unwrap_or_default();
                created = self
                    .store
                    .ensure_collection(collection, size, self.settings.distance)
                    .await?;
            }

            let points: Vec<Point> = batch
                .iter()
                .zip(vectors)
                .map(|(doc, vector)| {
                    let id = document::point_id(doc, self.settings.deterministic_ids);
                    let mut payload = doc.metadata.clone();
                    payload.insert("chunk_text".to_string(), Value::from(doc.content.as_str()));
                    Point {
                        id,
                        vector,
                        payload,
                    }
                })
                .collect();

            written += points.len();
            self.store.upsert(collection, points).await?;

            tracing::info!(
                batch = batch_no + 1,
                total = total_batches,
                "embedded and upserted batch"
            );
        }

        Ok((written, created))
    }
}

/// Collect `chunk_text` for every point in `collection`.
pub async fn export_corpus(store: &dyn PointStore, collection: &str) -> Result<LexicalCorpus> {
    let mut corpus = LexicalCorpus::new();
    let mut offset = None;

    loop {
        let page = store.scroll(collection, SCROLL_PAGE_SIZE, offset).await?;
        if page.points.is_empty() {
            break;
        }

        for point in page.points {
            if let Some(Value::String(text)) = point.payload.get("chunk_text") {
                if !text.is_empty() {
                    corpus.insert(point.id.clone(), text.clone());
                }
            }
        }

        match page.next_offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use crate::store::{Hit, ScrollPage};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(inputs.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
        }
    }

    /// Fails on every other call so summary errors can be exercised.
    struct FlakySummarizer {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChatModel for FlakySummarizer {
        async fn chat_completion(&self, _model: &str, _messages: Vec<Message>) -> Result<LlmResponse> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls % 2 == 0 {
                return Err(RagError::LlmApi("rate limited".to_string()));
            }
            Ok(LlmResponse {
                content: "  A short summary.  ".to_string(),
                finish_reason: None,
                usage: None,
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        collections: Mutex<Vec<(String, usize, Distance)>>,
        points: Mutex<Vec<Point>>,
        upserts: Mutex<usize>,
    }

    #[async_trait]
    impl PointStore for MemoryStore {
        async fn ensure_collection(&self, name: &str, size: usize, distance: Distance) -> Result<bool> {
            let mut collections = self.collections.lock().unwrap();
            if collections.iter().any(|(n, _, _)| n == name) {
                return Ok(false);
            }
            collections.push((name.to_string(), size, distance));
            Ok(true)
        }

        async fn upsert(&self, _collection: &str, points: Vec<Point>) -> Result<()> {
            *self.upserts.lock().unwrap() += 1;
            let mut stored = self.points.lock().unwrap();
            for point in points {
                stored.retain(|p| p.id != point.id);
                stored.push(point);
            }
            Ok(())
        }

        async fn scroll(&self, _collection: &str, limit: usize, offset: Option<Value>) -> Result<ScrollPage> {
            let stored = self.points.lock().unwrap();
            let start = offset.and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let end = (start + limit).min(stored.len());
            let points = stored[start..end]
                .iter()
                .map(|p| Hit {
                    id: p.id.clone(),
                    score: 0.0,
                    payload: p.payload.clone(),
                })
                .collect();
            let next_offset = (end < stored.len()).then(|| json!(end));
            Ok(ScrollPage { points, next_offset })
        }
    }

    fn chunks(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("Chunk number {} text.", i)).with_metadata("chunk_index", i))
            .collect()
    }

    fn settings(dir: &TempDir) -> IngestSettings {
        IngestSettings {
            collection: "docs".to_string(),
            batch_size: 2,
            deterministic_ids: true,
            corpus_path: Some(dir.path().join("docs_bm25_index.json")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_batches_and_exports_corpus() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let chat = FlakySummarizer { calls: Mutex::new(0) };
        let ingestor = Ingestor::new(&LengthEmbedder, &chat, &store, settings(&dir));

        let report = ingestor.run(chunks(5), "corpus/").await.unwrap();

        assert_eq!(report.chunks, 5);
        assert_eq!(report.points, 5);
        assert!(report.collection_created);
        assert_eq!(report.corpus_entries, 5);
        assert_eq!(*store.upserts.lock().unwrap(), 3);
        assert_eq!(
            store.collections.lock().unwrap()[0],
            ("docs".to_string(), 3, Distance::Cosine)
        );

        let points = store.points.lock().unwrap();
        assert_eq!(points[0].payload["chunk_text"], "Chunk number 0 text.");
        assert_eq!(points[0].payload["source"], "corpus/");
        assert_eq!(points[4].payload["neighbor_next"], Value::Null);

        let corpus = persistence::load_corpus(report.corpus_path.as_ref().unwrap()).unwrap();
        assert_eq!(corpus.get(&points[2].id).map(String::as_str), Some("Chunk number 2 text."));
    }

    #[tokio::test]
    async fn test_corpus_write_failure_keeps_ingest() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = MemoryStore::default();
        let chat = FlakySummarizer { calls: Mutex::new(0) };
        let settings = IngestSettings {
            corpus_path: Some(blocker.join("docs_bm25_index.json")),
            ..settings(&dir)
        };
        let ingestor = Ingestor::new(&LengthEmbedder, &chat, &store, settings);

        let report = tokio_test::assert_ok!(ingestor.run(chunks(2), "corpus/").await);
        assert_eq!(report.points, 2);
        assert_eq!(report.corpus_entries, 2);
        assert!(report.corpus_path.is_none());
        assert_eq!(store.points.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deterministic_ids_make_reingest_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let chat = FlakySummarizer { calls: Mutex::new(0) };
        let ingestor = Ingestor::new(&LengthEmbedder, &chat, &store, settings(&dir));

        ingestor.run(chunks(3), "corpus/").await.unwrap();
        let second = ingestor.run(chunks(3), "corpus/").await.unwrap();

        assert!(!second.collection_created);
        assert_eq!(store.points.lock().unwrap().len(), 3);
        assert_eq!(second.corpus_entries, 3);
    }

    #[tokio::test]
    async fn test_empty_input_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let chat = FlakySummarizer { calls: Mutex::new(0) };
        let ingestor = Ingestor::new(&LengthEmbedder, &chat, &store, settings(&dir));

        let report = ingestor.run(Vec::new(), "corpus/").await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert!(store.collections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summaries_skip_short_chunks_and_failures() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let chat = FlakySummarizer { calls: Mutex::new(0) };
        let ingestor = Ingestor::new(&LengthEmbedder, &chat, &store, settings(&dir));

        let long = "word ".repeat(60);
        let docs = vec![
            Document::new("too short").with_metadata("chunk_index", 0),
            Document::new(long.clone()).with_metadata("chunk_index", 1),
            Document::new(long.clone()).with_metadata("chunk_index", 2),
            Document::new(long).with_metadata("chunk_index", 3),
        ];

        let summaries = ingestor.summarize(&docs).await;
        // second long chunk hits the failing call
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].content, "A short summary.");
        assert_eq!(summaries[0].metadata["is_summary"], true);
        assert_eq!(summaries[0].metadata["chunk_index"], 1);
        assert_eq!(summaries[1].metadata["chunk_index"], 3);
        assert_eq!(*chat.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_export_skips_points_without_text() {
        let store = MemoryStore::default();
        let mut with_text = Map::new();
        with_text.insert("chunk_text".to_string(), json!("kept"));
        store
            .upsert(
                "docs",
                vec![
                    Point { id: "a".to_string(), vector: vec![], payload: with_text },
                    Point { id: "b".to_string(), vector: vec![], payload: Map::new() },
                ],
            )
            .await
            .unwrap();

        let corpus = tokio_test::assert_ok!(export_corpus(&store, "docs").await);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus["a"], "kept");
    }
}
