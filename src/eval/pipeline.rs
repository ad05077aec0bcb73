//! Retrieval-and-generation pipeline.
//!
//! One query in, ranked contexts and an optional generated answer out.

use crate::error::Result;
use crate::llm::{ChatModel, Embedder, Message, Prompts, fill, join_contexts};
use crate::store::{Hit, SearchRequest, VectorSearch};
use serde::{Deserialize, Serialize};

/// Retrieval and generation parameters for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub collection: String,
    /// Embedding model for the query.
    pub vector_model: String,
    /// Chat model for answers. Empty disables generation.
    pub llm_model: String,
    /// Maximum contexts retrieved.
    pub k: usize,
    /// Request blended lexical and vector ranking.
    pub hybrid: bool,
    /// Vector weight in hybrid ranking.
    pub alpha: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            collection: String::new(),
            vector_model: "text-embedding-3-large".to_string(),
            llm_model: "gpt-4.1-mini".to_string(),
            k: 100,
            hybrid: true,
            alpha: 0.35,
        }
    }
}

/// Output of the pipeline for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    /// Passage text per hit, aligned with `hits`.
    pub contexts: Vec<String>,
    /// Generated answer, `None` when generation is disabled.
    pub answer: Option<String>,
    pub hits: Vec<Hit>,
}

impl PipelineResult {
    /// Identifiers of every retrieved document.
    pub fn retrieved_doc_ids(&self) -> Vec<String> {
        self.hits.iter().flat_map(Hit::doc_ids).collect()
    }
}

async fn search_with_fallback(store: &dyn VectorSearch, request: SearchRequest) -> Result<Vec<Hit>> {
    match store.search(&request).await {
        Err(e) if e.is_unsupported() && request.hybrid.is_some() => {
            tracing::debug!(error = %e, "hybrid search unsupported, retrying as vector search");
            store.search(&request.without_hybrid()).await
        }
        other => other,
    }
}

/// Retrieve contexts for `query` and, when a chat model is set, answer it.
pub async fn retrieve_and_generate(
    query: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorSearch,
    chat: &dyn ChatModel,
    settings: &RetrievalSettings,
) -> Result<PipelineResult> {
    let vector = embedder.embed_one(&settings.vector_model, query).await?;

    let mut hits = if settings.k == 0 {
        Vec::new()
    } else {
        let request = SearchRequest::vector(&settings.collection, vector, settings.k);
        let request = if settings.hybrid {
            request.with_hybrid(query, settings.alpha)
        } else {
            request
        };
        search_with_fallback(store, request).await?
    };
    hits.truncate(settings.k);

    let contexts: Vec<String> = hits.iter().map(|h| h.content().to_string()).collect();

    tracing::debug!(query, hits = hits.len(), "retrieved contexts");

    let answer = if settings.llm_model.is_empty() {
        None
    } else {
        let context = join_contexts(&contexts, settings.k);
        let user = fill(Prompts::rag_answer(), &[("context", context.as_str()), ("question", query)]);
        let messages = vec![Message::system(Prompts::system_assistant()), Message::user(user)];
        let response = chat.chat_completion(&settings.llm_model, messages).await?;
        Some(response.content)
    };

    Ok(PipelineResult {
        query: query.to_string(),
        contexts,
        answer,
        hits,
    })
}
