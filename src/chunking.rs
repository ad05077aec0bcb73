//! Text chunking on paragraph and sentence boundaries.
//!
//! Sizes are measured in characters. Paragraphs are packed together while the
//! group fits; a paragraph that is too long on its own is split into sentences
//! and packed greedily. Consecutive chunks then share `chunk_overlap`
//! characters of leading context.

use regex::Regex;
use std::sync::LazyLock;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

/// Configuration for text chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum characters per chunk, before overlap is added.
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on whitespace that follows `.`, `!` or `?`.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    let mut in_gap = false;

    for (pos, c) in paragraph.char_indices() {
        if c.is_whitespace() {
            if prev_terminal && !in_gap {
                sentences.push(&paragraph[start..pos]);
                in_gap = true;
            }
            if in_gap {
                start = pos + c.len_utf8();
            }
        } else {
            in_gap = false;
        }
        prev_terminal = matches!(c, '.' | '!' | '?') || (in_gap && prev_terminal);
    }

    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn pack_sentences(paragraph: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();

    for sentence in split_sentences(paragraph) {
        if char_len(&current) + char_len(sentence) <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = sentence.to_string();
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
}

fn flush(group: &mut Vec<&str>, chunks: &mut Vec<String>) {
    let chunk = group.join("\n\n");
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
    group.clear();
}

/// Prefix each chunk after the first with the tail of its predecessor.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    let mut overlapped: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match overlapped.last() {
            None => overlapped.push(chunk),
            Some(prev) => {
                let prev_len = char_len(prev);
                let tail: String = prev.chars().skip(prev_len.saturating_sub(overlap)).collect();
                overlapped.push(format!("{} {}", tail, chunk));
            }
        }
    }

    overlapped
}

/// Chunk `text` into non-empty segments.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let max_chars = config.chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_len = 0;

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let p = paragraph.trim();
        if p.is_empty() {
            continue;
        }
        let p_len = char_len(p);

        if p_len > max_chars {
            flush(&mut group, &mut chunks);
            group_len = 0;
            pack_sentences(p, max_chars, &mut chunks);
        } else if group_len + p_len + 2 <= max_chars {
            group.push(p);
            group_len += p_len + 2;
        } else {
            flush(&mut group, &mut chunks);
            group.push(p);
            group_len = p_len + 2;
        }
    }
    flush(&mut group, &mut chunks);

    if config.chunk_overlap > 0 && chunks.len() > 1 {
        apply_overlap(chunks, config.chunk_overlap)
    } else {
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overlap(chunk_size: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size,
            chunk_overlap: 0,
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkConfig::default()).is_empty());
        assert!(chunk_text("\n\n   \n\n", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_small_paragraphs_are_grouped() {
        let text = "First paragraph.\n\nSecond paragraph.\n\n\nThird.";
        let chunks = chunk_text(text, &no_overlap(500));
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph.\n\nThird."]);
    }

    #[test]
    fn test_group_flushes_when_full() {
        let text = "aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc";
        // each paragraph costs 12, so two fit in 24
        let chunks = chunk_text(text, &no_overlap(24));
        assert_eq!(chunks, vec!["aaaaaaaaaa\n\nbbbbbbbbbb", "cccccccccc"]);
    }

    #[test]
    fn test_long_paragraph_split_into_sentences() {
        let text = "One two three. Four five six! Seven eight nine? Ten.";
        let chunks = chunk_text(text, &no_overlap(30));
        assert_eq!(
            chunks,
            vec!["One two three. Four five six!", "Seven eight nine? Ten."]
        );
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_sentence_splitter() {
        assert_eq!(
            split_sentences("A b.  C d!\nE f? g"),
            vec!["A b.", "C d!", "E f?", "g"]
        );
        assert_eq!(split_sentences("v1.2 is out"), vec!["v1.2 is out"]);
    }

    #[test]
    fn test_overlap_uses_previous_chunk_tail() {
        let text = "aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc";
        let config = ChunkConfig {
            chunk_size: 12,
            chunk_overlap: 3,
        };
        let chunks = chunk_text(text, &config);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "aaaaaaaaaa");
        assert_eq!(chunks[1], "aaa bbbbbbbbbb");
        assert_eq!(chunks[2], "bbb cccccccccc");
    }

    #[test]
    fn test_overlap_longer_than_chunk_takes_whole_chunk() {
        let config = ChunkConfig {
            chunk_size: 4,
            chunk_overlap: 10,
        };
        let chunks = chunk_text("ab\n\ncd", &config);
        assert_eq!(chunks, vec!["ab", "ab cd"]);
    }

    #[test]
    fn test_single_chunk_has_no_overlap() {
        let config = ChunkConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        };
        assert_eq!(chunk_text("short text", &config), vec!["short text"]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Ünïcödé sentence one. Ünïcödé sentence two.";
        let chunks = chunk_text(text, &no_overlap(25));
        assert_eq!(chunks, vec!["Ünïcödé sentence one.", "Ünïcödé sentence two."]);
    }
}
