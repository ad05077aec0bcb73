//! Test case loading.
//!
//! Test files are JSON Lines, one case per line:
//!
//! ```json
//! {"query": "What is X?", "ground_truth": "X is Y.", "relevant_doc_ids": ["doc1"]}
//! ```
//!
//! `query` is required; the other fields are optional. Blank lines are skipped.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// A single evaluation case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// The question to ask.
    pub query: String,
    /// Reference answer, if labeled.
    #[serde(default)]
    pub ground_truth: Option<String>,
    /// Identifiers of documents that should be retrieved.
    #[serde(default)]
    pub relevant_doc_ids: BTreeSet<String>,
}

impl TestCase {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ground_truth: None,
            relevant_doc_ids: BTreeSet::new(),
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }

    pub fn with_relevant_doc(mut self, doc_id: impl Into<String>) -> Self {
        self.relevant_doc_ids.insert(doc_id.into());
        self
    }
}

/// Parse JSON Lines content. Line numbers in errors are 1-indexed.
pub fn parse_test_cases(content: &str) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let case: TestCase = serde_json::from_str(line).map_err(|e| RagError::Dataset {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        cases.push(case);
    }

    Ok(cases)
}

/// Load test cases from a JSON Lines file.
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
    let cases = parse_test_cases(&content)?;
    tracing::info!(path = %path.display(), cases = cases.len(), "loaded test cases");
    Ok(cases)
}
