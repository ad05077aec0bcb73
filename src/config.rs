//! Configuration for ingestion and evaluation.
//!
//! Supports both environment variables and a YAML config file.
//! Environment variables take precedence over config file values, and the
//! binaries let command-line flags override both.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default OpenAI-compatible API base.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Default Qdrant HTTP endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Chat model used for answer generation. Empty disables generation.
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            model: "gpt-4.1-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name (e.g., "text-embedding-3-large")
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-large".to_string(),
        }
    }
}

/// Qdrant connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// HTTP URL of the Qdrant server
    pub url: String,

    /// API key (Qdrant Cloud)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_QDRANT_URL.to_string(),
            api_key: None,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,
    /// Embedding settings
    pub embedding: EmbeddingConfig,
    /// Vector database settings
    pub qdrant: QdrantConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    embedding: Option<EmbeddingFileSection>,
    qdrant: Option<QdrantFileSection>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingFileSection {
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QdrantFileSection {
    url: Option<String>,
    api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (OPENAI_API_KEY, QDRANT_URL, ...)
    /// 2. Config file (~/.config/rag-evaluator/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// Load variables from a dotenv file into the process environment.
    ///
    /// Variables already present in the environment are left untouched.
    pub fn load_env_file(path: &Path) -> Result<()> {
        dotenvy::from_path(path).map_err(|e| {
            RagError::Config(format!("Failed to load env file '{}': {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), "environment variables loaded");
        Ok(())
    }

    /// Overlay values found through `lookup` onto this configuration.
    ///
    /// Lower-case spellings of the API key variables are accepted as well.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k));

        if let Some(api_base) = first(&["OPENAI_API_BASE", "LLM_API_BASE"]) {
            self.llm.api_base = api_base;
        }

        if let Some(api_key) = first(&["OPENAI_API_KEY", "openai_api_key"]) {
            self.llm.api_key = api_key;
        }

        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(tokens) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = tokens;
        }

        if let Some(temp) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = temp;
        }

        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Some(url) = lookup("QDRANT_URL") {
            self.qdrant.url = url;
        }

        if let Some(api_key) = first(&["QDRANT_API_KEY", "qdrant_api_key"]) {
            self.qdrant.api_key = Some(api_key);
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Self::from_yaml(&content)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
        }

        if let Some(model) = file_config.embedding.and_then(|e| e.model) {
            config.embedding.model = model;
        }

        if let Some(qdrant) = file_config.qdrant {
            if let Some(url) = qdrant.url {
                config.qdrant.url = url;
            }
            if qdrant.api_key.is_some() {
                config.qdrant.api_key = qdrant.api_key;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-evaluator")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(RagError::Config(
                "LLM API base URL is required. Set OPENAI_API_BASE or add it to the config file."
                    .to_string(),
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(RagError::Config(
                "OPENAI_API_KEY is not set. Provide --openai-api-key, set it in the environment, or put it in the .env file.".to_string()
            ));
        }

        if self.embedding.model.is_empty() {
            return Err(RagError::Config(
                "Embedding model is required. Set EMBEDDING_MODEL or pass --vector-model."
                    .to_string(),
            ));
        }

        if self.qdrant.url.is_empty() {
            return Err(RagError::Config(
                "Qdrant URL is required. Set QDRANT_URL or pass --qdrant-url.".to_string(),
            ));
        }

        Ok(())
    }
}
