//! LLM-as-judge evaluators.
//!
//! Each judge prompts a chat model with the case and parses a JSON verdict.
//! Scores are normalized to `[0, 1]`.

use super::frameworks::{EvalInput, Evaluator};
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Message, Prompts, extract_json, fill, join_contexts};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Contexts beyond this many are not shown to a judge.
pub const JUDGE_CONTEXT_LIMIT: usize = 20;

const NO_ANSWER: &str = "(no answer was generated)";
const NO_GROUND_TRUTH: &str = "(no reference answer provided)";

/// Principles checked by the constitutional judge.
pub const CONSTITUTION: &[&str] = &[
    "The answer is factually consistent with the reference answer.",
    "The answer does not contradict any statement in the reference answer.",
    "The answer covers the key information contained in the reference answer.",
    "The answer does not invent names, numbers or dates absent from the reference answer.",
    "The answer stays on topic and avoids irrelevant content.",
];

/// Prompt `model` with `prompt` and parse the JSON reply.
async fn ask_judge<T: DeserializeOwned + Send>(chat: &dyn ChatModel, model: &str, prompt: String) -> Result<T> {
    let messages = vec![Message::system(Prompts::system_judge()), Message::user(prompt)];
    let response = chat.chat_completion(model, messages).await?;
    let json_str = extract_json(&response.content);

    serde_json::from_str(&json_str).map_err(|e| {
        RagError::LlmParse(format!(
            "Failed to parse judge response: {}. Response: {}",
            e, response.content
        ))
    })
}

fn unit_score(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(RagError::Evaluator(format!("{} is not a number", what)))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn has_context(contexts: &[String]) -> bool {
    contexts.iter().any(|c| !c.trim().is_empty())
}

/// RAGAS-style metrics: faithfulness, answer correctness and context recall.
pub struct RagasJudge {
    chat: Arc<dyn ChatModel>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct RagasVerdict {
    faithfulness: f64,
    answer_correctness: f64,
    context_recall: f64,
}

impl RagasJudge {
    pub fn new(chat: Arc<dyn ChatModel>, model: String) -> Self {
        Self { chat, model }
    }
}

#[async_trait]
impl Evaluator for RagasJudge {
    fn name(&self) -> &str {
        "ragas"
    }

    async fn score(&self, input: &EvalInput<'_>) -> Result<f64> {
        let contexts = join_contexts(input.contexts, JUDGE_CONTEXT_LIMIT);
        let prompt = fill(
            Prompts::ragas_judge(),
            &[
                ("contexts", contexts.as_str()),
                ("answer", input.answer.unwrap_or(NO_ANSWER)),
                ("ground_truth", input.ground_truth.unwrap_or(NO_GROUND_TRUTH)),
            ],
        );

        let verdict: RagasVerdict = ask_judge(self.chat.as_ref(), &self.model, prompt).await?;

        let metrics = [
            unit_score(verdict.faithfulness, "faithfulness")?,
            unit_score(verdict.answer_correctness, "answer_correctness")?,
            unit_score(verdict.context_recall, "context_recall")?,
        ];
        Ok(mean(&metrics))
    }
}

/// Checks the answer against [`CONSTITUTION`]; score is the satisfied fraction.
pub struct ConstitutionalJudge {
    chat: Arc<dyn ChatModel>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ConstitutionVerdicts {
    verdicts: Vec<PrincipleVerdict>,
}

#[derive(Debug, Deserialize)]
struct PrincipleVerdict {
    satisfied: bool,
    #[serde(default)]
    reason: Option<String>,
}

impl ConstitutionalJudge {
    pub fn new(chat: Arc<dyn ChatModel>, model: String) -> Self {
        Self { chat, model }
    }

    fn numbered_principles() -> String {
        CONSTITUTION
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Evaluator for ConstitutionalJudge {
    fn name(&self) -> &str {
        "cj"
    }

    async fn score(&self, input: &EvalInput<'_>) -> Result<f64> {
        let ground_truth = input
            .ground_truth
            .ok_or_else(|| RagError::Evaluator("constitutional judge needs a ground truth".to_string()))?;
        let answer = input
            .answer
            .ok_or_else(|| RagError::Evaluator("constitutional judge needs an answer".to_string()))?;

        let principles = Self::numbered_principles();
        let prompt = fill(
            Prompts::constitutional_judge(),
            &[
                ("principles", principles.as_str()),
                ("answer", answer),
                ("ground_truth", ground_truth),
            ],
        );

        let parsed: ConstitutionVerdicts = ask_judge(self.chat.as_ref(), &self.model, prompt).await?;

        // Missing verdicts count as unsatisfied.
        let mut satisfied = 0;
        for (i, verdict) in parsed.verdicts.iter().take(CONSTITUTION.len()).enumerate() {
            tracing::debug!(
                principle = i + 1,
                satisfied = verdict.satisfied,
                reason = verdict.reason.as_deref().unwrap_or(""),
                "principle judged"
            );
            if verdict.satisfied {
                satisfied += 1;
            }
        }
        Ok(satisfied as f64 / CONSTITUTION.len() as f64)
    }
}

/// Nodes of the grading graph, visited in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    GradeContext,
    GradeGroundedness,
    GradeAnswer,
    DocRecall,
}

impl GraphNode {
    pub const START: GraphNode = GraphNode::GradeContext;

    pub fn next(self) -> Option<GraphNode> {
        match self {
            GraphNode::GradeContext => Some(GraphNode::GradeGroundedness),
            GraphNode::GradeGroundedness => Some(GraphNode::GradeAnswer),
            GraphNode::GradeAnswer => Some(GraphNode::DocRecall),
            GraphNode::DocRecall => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GraphNode::GradeContext => "grade_context",
            GraphNode::GradeGroundedness => "grade_groundedness",
            GraphNode::GradeAnswer => "grade_answer",
            GraphNode::DocRecall => "doc_recall",
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeGrade {
    score: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// Fraction of `relevant` found in `retrieved`; `None` when nothing is labeled.
pub fn doc_recall(relevant: &BTreeSet<String>, retrieved: &[String]) -> Option<f64> {
    if relevant.is_empty() {
        return None;
    }
    let found = relevant.iter().filter(|id| retrieved.contains(id)).count();
    Some(found as f64 / relevant.len() as f64)
}

/// Walks the grading graph and averages the visited nodes.
pub struct GraphJudge {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl GraphJudge {
    pub fn new(chat: Arc<dyn ChatModel>, model: String) -> Self {
        Self { chat, model }
    }

    async fn grade(&self, node: GraphNode, prompt: String) -> Result<f64> {
        let grade: NodeGrade = ask_judge(self.chat.as_ref(), &self.model, prompt).await?;
        tracing::debug!(
            node = node.as_str(),
            score = grade.score,
            reason = grade.reason.as_deref().unwrap_or(""),
            "graph node graded"
        );
        unit_score(grade.score, node.as_str())
    }

    /// Score for one node, or `None` when the node is skipped.
    async fn visit(&self, node: GraphNode, input: &EvalInput<'_>) -> Result<Option<f64>> {
        let contexts = join_contexts(input.contexts, JUDGE_CONTEXT_LIMIT);
        let answer = input.answer.unwrap_or(NO_ANSWER);

        let score = match node {
            GraphNode::GradeContext => {
                let prompt = fill(
                    Prompts::grade_context(),
                    &[("question", input.query), ("contexts", contexts.as_str())],
                );
                Some(self.grade(node, prompt).await?)
            }
            GraphNode::GradeGroundedness => {
                if has_context(input.contexts) {
                    let prompt = fill(
                        Prompts::grade_groundedness(),
                        &[("contexts", contexts.as_str()), ("answer", answer)],
                    );
                    Some(self.grade(node, prompt).await?)
                } else {
                    Some(0.0)
                }
            }
            GraphNode::GradeAnswer => {
                let prompt = fill(
                    Prompts::grade_answer(),
                    &[("question", input.query), ("answer", answer)],
                );
                Some(self.grade(node, prompt).await?)
            }
            GraphNode::DocRecall => doc_recall(input.relevant_doc_ids, &input.retrieved_doc_ids),
        };

        Ok(score)
    }
}

#[async_trait]
impl Evaluator for GraphJudge {
    fn name(&self) -> &str {
        "langgraph"
    }

    async fn score(&self, input: &EvalInput<'_>) -> Result<f64> {
        let mut scores = Vec::new();
        let mut node = Some(GraphNode::START);

        while let Some(current) = node {
            if let Some(score) = self.visit(current, input).await? {
                scores.push(score);
            }
            node = current.next();
        }

        Ok(mean(&scores))
    }
}
