//! Loading ingestion sources: URLs, single files and directories.

use crate::chunking::ChunkConfig;
use crate::document::Document;
use crate::error::{RagError, Result};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// File extensions read as text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "csv", "json", "jsonl", "log", "html", "htm",
];

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid script regex"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid style regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|h[1-6]|li|tr|section|article|header|footer)\b[^>]*>")
        .expect("valid block tag regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)*").expect("valid blank line regex"));
static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid space regex"));

/// Whether `source` names a remote document.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn has_html_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce an HTML page to readable text with paragraph breaks.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_TAG.replace_all(&text, "\n\n");
    let text = TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = SPACE_RUN.replace_all(&text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    BLANK_RUN
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Fetch a URL as a document.
async fn load_url(url: &str, client: &reqwest::Client) -> Result<Document> {
    tracing::info!(url, "fetching");
    let response = client.get(url).send().await?.error_for_status()?;

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(false)
        || has_html_extension(url);

    let body = response.text().await?;
    let content = if is_html { html_to_text(&body) } else { body };

    Ok(Document::new(content).with_metadata("source", url))
}

fn load_file(path: &Path) -> Result<Document> {
    let mut doc = Document::from_text_file(path)?;
    if has_html_extension(&path.to_string_lossy()) {
        doc.content = html_to_text(&doc.content);
    }
    Ok(doc)
}

/// Supported files under `dir`, sorted by path.
pub fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_supported(path) {
            files.push(path.to_path_buf());
        } else {
            tracing::warn!(path = %path.display(), "skipping unsupported file");
        }
    }

    files
}

/// Load whole documents from a URL, file or directory.
pub async fn load_documents(source: &str, client: &reqwest::Client) -> Result<Vec<Document>> {
    if is_url(source) {
        return Ok(vec![load_url(source, client).await?]);
    }

    let path = Path::new(source);
    if !path.exists() {
        return Err(RagError::SourceNotFound(path.to_path_buf()));
    }

    if path.is_file() {
        return Ok(vec![load_file(path)?]);
    }

    let files = collect_files(path);
    if files.is_empty() {
        return Err(RagError::EmptyCorpus(path.to_path_buf()));
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        match load_file(file) {
            Ok(doc) => documents.push(doc),
            Err(RagError::Io { path: skipped, source }) if source.kind() == ErrorKind::InvalidData => {
                tracing::warn!(path = %skipped.display(), "skipping file that is not valid UTF-8");
            }
            Err(e) => return Err(e),
        }
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus(path.to_path_buf()));
    }
    Ok(documents)
}

/// Load a source and split every document into chunks.
pub async fn load_source(
    source: &str,
    config: &ChunkConfig,
    client: &reqwest::Client,
) -> Result<Vec<Document>> {
    let documents = load_documents(source, client).await?;
    let chunks: Vec<Document> = documents.iter().flat_map(|d| d.chunks(config)).collect();

    tracing::info!(
        source,
        documents = documents.len(),
        chunks = chunks.len(),
        "loaded source"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_html_to_text() {
        let html = r#"<html><head><style>p { color: red; }</style>
<script>var x = "<p>";</script></head>
<body><h1>Title</h1><!-- hidden --><p>Tom &amp; Jerry&nbsp;run.</p><p>Second   para</p></body></html>"#;
        assert_eq!(html_to_text(html), "Title\n\nTom & Jerry run.\n\nSecond para");
    }

    #[test]
    fn test_collect_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.JSON"), "{}").unwrap();

        let names: Vec<String> = collect_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.JSON"]);
    }

    #[tokio::test]
    async fn test_directory_skips_non_utf8_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "Plain text.").unwrap();
        // "café" in Latin-1
        fs::write(dir.path().join("b.csv"), [0x63u8, 0x61, 0x66, 0xE9]).unwrap();
        let client = reqwest::Client::new();

        let source = dir.path().to_string_lossy().to_string();
        let docs = load_documents(&source, &client).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Plain text.");

        fs::remove_file(dir.path().join("a.txt")).unwrap();
        let err = load_documents(&source, &client).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let client = reqwest::Client::new();
        let err = load_documents("/nonexistent/corpus", &client).await.unwrap_err();
        assert!(matches!(err, RagError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("only.bin"), [0u8]).unwrap();
        let client = reqwest::Client::new();
        let source = dir.path().to_string_lossy().to_string();
        let err = load_documents(&source, &client).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
    }

    #[tokio::test]
    async fn test_load_source_chunks_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "Alpha paragraph.\n\nBeta paragraph.").unwrap();

        let config = ChunkConfig {
            chunk_size: 20,
            chunk_overlap: 0,
        };
        let client = reqwest::Client::new();
        let chunks = load_source(&file.to_string_lossy(), &config, &client)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Alpha paragraph.");
        assert_eq!(chunks[1].metadata["chunk_index"], 1);
        assert_eq!(chunks[0].source(), Some(file.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn test_load_url_strips_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>Hello</p><p>World</p>", "text/html"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/page", server.uri());
        let docs = load_documents(&url, &reqwest::Client::new()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Hello\n\nWorld");
        assert_eq!(docs[0].source(), Some(url.as_str()));
    }
}
