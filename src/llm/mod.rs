//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for chat and embedding calls,
//! the traits the pipeline is written against, and the prompts it sends.

mod client;
mod embeddings;
mod prompts;

pub use client::{ChatModel, LlmClient, LlmResponse, Message, Role, TokenUsage, extract_json};
pub use embeddings::Embedder;
pub use prompts::{CONTEXT_SEPARATOR, Prompts, fill, join_contexts};
