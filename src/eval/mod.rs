//! Evaluation of a retrieval-augmented generation pipeline.
//!
//! This module provides:
//! - Test case loading (JSON Lines)
//! - The retrieval-and-generation pipeline
//! - LLM-as-judge evaluators behind a name-keyed registry
//! - Run-scoped score accumulation and reporting

pub mod dataset;
pub mod frameworks;
pub mod judges;
pub mod pipeline;
pub mod runner;
pub mod scoreboard;

pub use dataset::{TestCase, load_test_cases, parse_test_cases};
pub use frameworks::{Acquired, EvalInput, Evaluator, EvaluatorRegistry, Framework, Unavailable};
pub use judges::{ConstitutionalJudge, GraphJudge, GraphNode, RagasJudge};
pub use pipeline::{PipelineResult, RetrievalSettings, retrieve_and_generate};
pub use runner::{CaseRecord, EvaluationRun, RunReport};
pub use scoreboard::{FrameworkSummary, ScoreBoard};
