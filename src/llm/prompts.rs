//! LLM prompts for answer generation, summaries, and the judge evaluators.
//!
//! Templates use `{placeholder}` markers filled in one pass by [`fill`].

/// Separator placed between context snippets.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Collection of prompts used across ingestion and evaluation.
pub struct Prompts;

impl Prompts {
    /// System message for answer generation.
    pub fn system_assistant() -> &'static str {
        "You are a helpful assistant."
    }

    /// User message for answer generation from retrieved context.
    pub fn rag_answer() -> &'static str {
        "Use the following context to answer the question.\n\nContext:\n{context}\n\nQuestion: {question}"
    }

    /// Prompt to summarize a chunk for multi-granularity indexing.
    pub fn chunk_summary() -> &'static str {
        "Provide a concise (1-2 sentences) summary of the following text:\n\n{content}"
    }

    /// System message shared by every judge.
    pub fn system_judge() -> &'static str {
        "You are a strict, impartial evaluator of retrieval-augmented generation systems. Always respond with valid JSON when requested."
    }

    /// RAGAS-style judgement over answer, ground truth and contexts.
    pub fn ragas_judge() -> &'static str {
        r#"You are evaluating an answer produced by a retrieval-augmented generation system.

Retrieved contexts:
{contexts}

Generated answer:
{answer}

Ground truth answer:
{ground_truth}

Rate each metric between 0.0 and 1.0:
- faithfulness: fraction of claims in the generated answer that are supported by the retrieved contexts
- answer_correctness: factual agreement between the generated answer and the ground truth
- context_recall: fraction of the ground truth that can be attributed to the retrieved contexts

Respond in JSON format:
{
    "faithfulness": <0.0-1.0>,
    "answer_correctness": <0.0-1.0>,
    "context_recall": <0.0-1.0>
}

Respond with only the JSON, no other text."#
    }

    /// Constitutional judgement of an answer against a reference.
    pub fn constitutional_judge() -> &'static str {
        r#"You are a constitutional judge. Check the answer against each principle of the constitution, using the reference answer as the source of truth.

Constitution:
{principles}

Answer under review:
{answer}

Reference answer:
{ground_truth}

Respond in JSON format:
{
    "verdicts": [
        {"principle": <principle number>, "satisfied": <true/false>, "reason": "<brief reason>"},
        ...
    ]
}

Give exactly one verdict per principle. Respond with only the JSON, no other text."#
    }

    /// Graph node: are the retrieved contexts relevant to the query?
    pub fn grade_context() -> &'static str {
        r#"Grade how relevant the retrieved contexts are to the question.

Question: {question}

Retrieved contexts:
{contexts}

Respond in JSON format:
{"score": <0.0-1.0>, "reason": "<brief explanation>"}

Respond with only the JSON, no other text."#
    }

    /// Graph node: is the answer grounded in the retrieved contexts?
    pub fn grade_groundedness() -> &'static str {
        r#"Grade whether every statement in the answer is supported by the retrieved contexts.

Retrieved contexts:
{contexts}

Answer: {answer}

Respond in JSON format:
{"score": <0.0-1.0>, "reason": "<brief explanation>"}

Respond with only the JSON, no other text."#
    }

    /// Graph node: does the answer address the question?
    pub fn grade_answer() -> &'static str {
        r#"Grade whether the answer resolves the question.

Question: {question}

Answer: {answer}

Respond in JSON format:
{"score": <0.0-1.0>, "reason": "<brief explanation>"}

Respond with only the JSON, no other text."#
    }
}

/// Substitute `{name}` markers in `template` from `values`.
///
/// Only the template is scanned, so inserted values are copied verbatim even
/// when they contain marker-like text. Braces that do not form a known marker
/// are kept.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let marker = after.find('}').and_then(|end| {
            values
                .iter()
                .find(|(name, _)| *name == &after[..end])
                .map(|(_, value)| (*value, end))
        });

        match marker {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Join context snippets for inclusion in a prompt, keeping at most `k`.
pub fn join_contexts(contexts: &[String], k: usize) -> String {
    contexts
        .iter()
        .take(k)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_not_empty() {
        assert!(!Prompts::system_assistant().is_empty());
        assert!(Prompts::rag_answer().contains("{context}"));
        assert!(Prompts::rag_answer().contains("{question}"));
        assert!(Prompts::chunk_summary().contains("{content}"));
        assert!(Prompts::ragas_judge().contains("{ground_truth}"));
        assert!(Prompts::constitutional_judge().contains("{principles}"));
        assert!(Prompts::grade_context().contains("{contexts}"));
        assert!(Prompts::grade_groundedness().contains("{answer}"));
        assert!(Prompts::grade_answer().contains("{question}"));
    }

    #[test]
    fn test_fill_is_single_pass() {
        let filled = fill(
            Prompts::rag_answer(),
            &[("context", "write {question} here"), ("question", "What is X?")],
        );
        assert_eq!(
            filled,
            "Use the following context to answer the question.\n\nContext:\nwrite {question} here\n\nQuestion: What is X?"
        );
    }

    #[test]
    fn test_fill_keeps_unknown_braces() {
        assert_eq!(fill("{\"score\": {x}} {y", &[("x", "1")]), "{\"score\": 1} {y");
        assert_eq!(fill("no markers", &[("x", "1")]), "no markers");
    }

    #[test]
    fn test_join_contexts_bounds() {
        let contexts = vec!["a".to_string(), "".to_string(), "c".to_string()];
        assert_eq!(join_contexts(&contexts, 2), "a\n\n---\n\n");
        assert_eq!(join_contexts(&contexts, 0), "");
        assert_eq!(join_contexts(&contexts, 10), "a\n\n---\n\n\n\n---\n\nc");
    }
}
