//! Run-scoped score accumulation and the per-framework summary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Scores per framework for one run.
///
/// A framework's list grows only when it produced a score for a case.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    order: Vec<String>,
    scores: HashMap<String, Vec<f64>>,
}

impl ScoreBoard {
    /// Board with an empty list for each configured framework, in order.
    pub fn new<S: AsRef<str>>(frameworks: &[S]) -> Self {
        let mut board = Self::default();
        for name in frameworks {
            board.ensure(name.as_ref());
        }
        board
    }

    fn ensure(&mut self, framework: &str) -> &mut Vec<f64> {
        if !self.scores.contains_key(framework) {
            self.order.push(framework.to_string());
        }
        self.scores.entry(framework.to_string()).or_default()
    }

    pub fn record(&mut self, framework: &str, score: f64) {
        self.ensure(framework).push(score);
    }

    pub fn scores(&self, framework: &str) -> &[f64] {
        self.scores.get(framework).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One summary per framework, in configured order.
    pub fn summary(&self) -> Vec<FrameworkSummary> {
        self.order
            .iter()
            .map(|name| FrameworkSummary::from_scores(name, self.scores(name)))
            .collect()
    }
}

/// Aggregate for one framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSummary {
    pub framework: String,
    /// Cases that produced a score.
    pub count: usize,
    /// Mean score, `None` when nothing was scored.
    pub average: Option<f64>,
}

impl FrameworkSummary {
    pub fn from_scores(framework: &str, scores: &[f64]) -> Self {
        let average = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        Self {
            framework: framework.to_string(),
            count: scores.len(),
            average,
        }
    }
}

impl fmt::Display for FrameworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average {
            Some(avg) => write!(
                f,
                "[{}] Average score over {} cases: {:.4}",
                self.framework, self.count, avg
            ),
            None => write!(f, "[{}] No scores computed (check installation).", self.framework),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_counts_only_scored_cases() {
        let mut board = ScoreBoard::new(&["ragas"]);
        board.record("ragas", 0.5);
        board.record("ragas", 1.0);

        let summary = &board.summary()[0];
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(0.75));
        assert_eq!(summary.to_string(), "[ragas] Average score over 2 cases: 0.7500");
    }

    #[test]
    fn test_empty_framework_line() {
        let board = ScoreBoard::new(&["cj"]);
        assert_eq!(
            board.summary()[0].to_string(),
            "[cj] No scores computed (check installation)."
        );
    }

    #[test]
    fn test_summary_keeps_configured_order() {
        let mut board = ScoreBoard::new(&["langgraph", "ragas", "cj"]);
        board.record("bleu", 0.0);
        board.record("ragas", 0.2);

        let names: Vec<String> = board.summary().into_iter().map(|s| s.framework).collect();
        assert_eq!(names, vec!["langgraph", "ragas", "cj", "bleu"]);
        assert_eq!(board.scores("bleu"), &[0.0]);
        assert!(board.scores("missing").is_empty());
    }
}
