//! Evaluation frameworks and the registry that resolves them by name.
//!
//! A framework is acquired fresh for every test case. Acquisition either
//! yields a ready [`Evaluator`], reports why the framework is unavailable
//! in this build or configuration, or reports that the name is unknown.

use super::dataset::TestCase;
use super::judges::{ConstitutionalJudge, GraphJudge, RagasJudge};
use super::pipeline::PipelineResult;
use crate::error::{RagError, Result};
use crate::llm::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Built-in evaluation frameworks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Faithfulness, answer correctness and context recall.
    Ragas,
    /// Constitutional judge over answer and reference.
    Cj,
    /// Graph of grading nodes over query, contexts and answer.
    Langgraph,
}

impl Framework {
    /// Every built-in framework, in default run order.
    pub const ALL: [Framework; 3] = [Framework::Ragas, Framework::Cj, Framework::Langgraph];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Ragas => "ragas",
            Framework::Cj => "cj",
            Framework::Langgraph => "langgraph",
        }
    }

    /// Whether support for this framework was compiled in.
    pub fn enabled(&self) -> bool {
        match self {
            Framework::Ragas => cfg!(feature = "ragas"),
            Framework::Cj => cfg!(feature = "cj"),
            Framework::Langgraph => cfg!(feature = "langgraph"),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        Framework::ALL
            .into_iter()
            .find(|fw| fw.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RagError::Config(format!("Unknown framework: {}", s)))
    }
}

/// Everything an evaluator may look at for one case.
#[derive(Debug, Clone)]
pub struct EvalInput<'a> {
    pub query: &'a str,
    pub answer: Option<&'a str>,
    pub ground_truth: Option<&'a str>,
    pub contexts: &'a [String],
    pub relevant_doc_ids: &'a BTreeSet<String>,
    /// Identifiers of the retrieved hits (point ids, `doc_id`, `source`).
    pub retrieved_doc_ids: Vec<String>,
}

impl<'a> EvalInput<'a> {
    pub fn new(case: &'a TestCase, result: &'a PipelineResult) -> Self {
        Self {
            query: &case.query,
            answer: result.answer.as_deref(),
            ground_truth: case.ground_truth.as_deref(),
            contexts: &result.contexts,
            relevant_doc_ids: &case.relevant_doc_ids,
            retrieved_doc_ids: result.retrieved_doc_ids(),
        }
    }
}

/// Scores one case.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, input: &EvalInput<'_>) -> Result<f64>;
}

/// Why a framework cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Unavailable(pub String);

/// Builds an evaluator, or explains why it cannot.
pub type EvaluatorFactory =
    Box<dyn Fn() -> std::result::Result<Box<dyn Evaluator>, Unavailable> + Send + Sync>;

/// Outcome of resolving a framework name.
pub enum Acquired {
    Ready(Box<dyn Evaluator>),
    Unavailable(String),
    Unknown,
}

/// Name to evaluator factory.
#[derive(Default)]
pub struct EvaluatorRegistry {
    factories: HashMap<String, EvaluatorFactory>,
}

impl EvaluatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in LLM judges.
    ///
    /// An empty `judge_model` leaves every judge unavailable.
    pub fn with_judges(chat: Arc<dyn ChatModel>, judge_model: &str) -> Self {
        let mut registry = Self::new();

        for framework in Framework::ALL {
            let chat = Arc::clone(&chat);
            let model = judge_model.to_string();
            registry.register(framework.as_str(), move || {
                if !framework.enabled() {
                    return Err(Unavailable(format!(
                        "built without the `{}` feature",
                        framework
                    )));
                }
                if model.is_empty() {
                    return Err(Unavailable("no judge model configured".to_string()));
                }
                let chat = Arc::clone(&chat);
                let model = model.clone();
                let evaluator: Box<dyn Evaluator> = match framework {
                    Framework::Ragas => Box::new(RagasJudge::new(chat, model)),
                    Framework::Cj => Box::new(ConstitutionalJudge::new(chat, model)),
                    Framework::Langgraph => Box::new(GraphJudge::new(chat, model)),
                };
                Ok(evaluator)
            });
        }

        registry
    }

    /// Register or replace a factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> std::result::Result<Box<dyn Evaluator>, Unavailable> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Resolve `name` to a fresh evaluator.
    pub fn acquire(&self, name: &str) -> Acquired {
        match self.factories.get(name) {
            None => Acquired::Unknown,
            Some(factory) => match factory() {
                Ok(evaluator) => Acquired::Ready(evaluator),
                Err(Unavailable(reason)) => Acquired::Unavailable(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, Message};

    struct SilentChat;

    #[async_trait]
    impl ChatModel for SilentChat {
        async fn chat_completion(&self, _model: &str, _messages: Vec<Message>) -> Result<LlmResponse> {
            Err(RagError::LlmApi("not expected".to_string()))
        }
    }

    struct Constant(f64);

    #[async_trait]
    impl Evaluator for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        async fn score(&self, _input: &EvalInput<'_>) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_framework_names() {
        assert_eq!(Framework::from_str("ragas").unwrap(), Framework::Ragas);
        assert_eq!(Framework::from_str(" CJ ").unwrap(), Framework::Cj);
        assert_eq!("langgraph".parse::<Framework>().unwrap(), Framework::Langgraph);
        assert!(matches!(Framework::from_str("bleu"), Err(RagError::Config(_))));
        assert_eq!(Framework::Langgraph.to_string(), "langgraph");
    }

    #[test]
    fn test_acquire_outcomes() {
        let mut registry = EvaluatorRegistry::new();
        registry.register("constant", || Ok(Box::new(Constant(0.5)) as Box<dyn Evaluator>));
        registry.register("missing", || Err(Unavailable("library not installed".to_string())));

        assert!(matches!(registry.acquire("constant"), Acquired::Ready(_)));
        match registry.acquire("missing") {
            Acquired::Unavailable(reason) => assert_eq!(reason, "library not installed"),
            _ => panic!("expected unavailable"),
        }
        assert!(matches!(registry.acquire("nope"), Acquired::Unknown));
    }

    #[test]
    fn test_judges_unavailable_without_model() {
        let registry = EvaluatorRegistry::with_judges(Arc::new(SilentChat), "");
        for framework in Framework::ALL {
            assert!(matches!(
                registry.acquire(framework.as_str()),
                Acquired::Unavailable(_)
            ));
        }
    }

    #[test]
    fn test_judges_ready_with_model() {
        let registry = EvaluatorRegistry::with_judges(Arc::new(SilentChat), "judge-model");
        for framework in Framework::ALL {
            match registry.acquire(framework.as_str()) {
                Acquired::Ready(evaluator) => {
                    assert!(framework.enabled());
                    assert_eq!(evaluator.name(), framework.as_str());
                }
                Acquired::Unavailable(_) => assert!(!framework.enabled()),
                Acquired::Unknown => panic!("built-in framework must be registered"),
            }
        }
    }
}
