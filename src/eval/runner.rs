//! Evaluation run: pipeline plus every configured framework, case by case.

use super::dataset::TestCase;
use super::frameworks::{Acquired, EvalInput, EvaluatorRegistry};
use super::pipeline::{PipelineResult, RetrievalSettings, retrieve_and_generate};
use super::scoreboard::{FrameworkSummary, ScoreBoard};
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Embedder};
use crate::store::VectorSearch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub query: String,
    pub answer: Option<String>,
    pub contexts_retrieved: usize,
    /// Framework name to score, for frameworks that produced one.
    pub scores: BTreeMap<String, f64>,
    /// Framework name to reason, for frameworks that were skipped.
    pub skipped: BTreeMap<String, String>,
}

/// Aggregated results of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub settings: RetrievalSettings,
    pub frameworks: Vec<FrameworkSummary>,
    pub cases: Vec<CaseRecord>,
    /// Total run time (seconds).
    pub total_time_secs: f64,
}

impl RunReport {
    /// One line per framework, in configured order.
    pub fn summary_lines(&self) -> Vec<String> {
        self.frameworks.iter().map(ToString::to_string).collect()
    }

    /// Print the summary to stdout.
    pub fn print_summary(&self) {
        for line in self.summary_lines() {
            println!("{}", line);
        }
    }

    /// Save as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| RagError::Serialization(e.to_string()))?;
        fs::write(path, content).map_err(|e| RagError::io(path, e))?;
        Ok(())
    }
}

/// Evaluation runner over injected capabilities.
pub struct EvaluationRun<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorSearch,
    chat: &'a dyn ChatModel,
    registry: &'a EvaluatorRegistry,
    settings: RetrievalSettings,
    frameworks: Vec<String>,
}

impl<'a> EvaluationRun<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorSearch,
        chat: &'a dyn ChatModel,
        registry: &'a EvaluatorRegistry,
        settings: RetrievalSettings,
        frameworks: Vec<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            registry,
            settings,
            frameworks,
        }
    }

    /// Run every case. Pipeline errors end the run; evaluator problems do not.
    pub async fn run(&self, cases: &[TestCase]) -> Result<RunReport> {
        let start_time = Instant::now();
        let mut board = ScoreBoard::new(&self.frameworks);
        let mut records = Vec::with_capacity(cases.len());

        tracing::info!(
            cases = cases.len(),
            frameworks = ?self.frameworks,
            collection = %self.settings.collection,
            "starting evaluation"
        );

        for (idx, case) in cases.iter().enumerate() {
            tracing::debug!(case = idx + 1, total = cases.len(), query = %case.query, "processing case");

            let result = retrieve_and_generate(
                &case.query,
                self.embedder,
                self.store,
                self.chat,
                &self.settings,
            )
            .await?;

            records.push(self.evaluate_case(idx, case, &result, &mut board).await);
        }

        Ok(RunReport {
            settings: self.settings.clone(),
            frameworks: board.summary(),
            cases: records,
            total_time_secs: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Score one case with every configured framework.
    pub async fn evaluate_case(
        &self,
        idx: usize,
        case: &TestCase,
        result: &PipelineResult,
        board: &mut ScoreBoard,
    ) -> CaseRecord {
        let input = EvalInput::new(case, result);
        let mut record = CaseRecord {
            query: case.query.clone(),
            answer: result.answer.clone(),
            contexts_retrieved: result.contexts.len(),
            scores: BTreeMap::new(),
            skipped: BTreeMap::new(),
        };

        for framework in &self.frameworks {
            match self.registry.acquire(framework) {
                Acquired::Ready(evaluator) => match evaluator.score(&input).await {
                    Ok(score) => {
                        board.record(framework, score);
                        record.scores.insert(framework.clone(), score);
                    }
                    Err(e) => {
                        tracing::warn!(framework = %framework, case = idx + 1, error = %e, "evaluation failed, skipping");
                        record.skipped.insert(framework.clone(), e.to_string());
                    }
                },
                Acquired::Unavailable(reason) => {
                    tracing::warn!(framework = %framework, case = idx + 1, reason = %reason, "framework unavailable, skipping");
                    record.skipped.insert(framework.clone(), reason);
                }
                Acquired::Unknown => {
                    board.record(framework, 0.0);
                    record.scores.insert(framework.clone(), 0.0);
                }
            }
        }

        record
    }
}
