//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/rag.sqlite"
//!
//! [corpus]
//! path = "./data/tsa_rules.txt"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [retrieval]
//! k = 20
//! metric = "l2"
//!
//! [chat]
//! provider = "openai"
//! model = "gpt-3.5-turbo"
//! ```
//!
//! Every section except `[db]` may be omitted. API keys are never read from
//! this file; they come from the environment (`OPENAI_API_KEY`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use tsa_rag_core::embedding::DistanceMetric;

/// Chat model used by default.
pub const GPT35_TURBO: &str = "gpt-3.5-turbo";
/// Higher-quality alternative chat model.
pub const GPT4_TURBO: &str = "gpt-4-0125-preview";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("./data/tsa_rules.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Matches retrieved as grounding context for `ask`.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Matches shown by `search`.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            search_limit: default_search_limit(),
            metric: DistanceMetric::default(),
        }
    }
}

fn default_k() -> usize {
    20
}
fn default_search_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Idle timeout: connecting, and each wait for more of the streamed answer.
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_chat_provider(),
            model: default_chat_model(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_provider() -> String {
    "openai".to_string()
}
fn default_chat_model() -> String {
    GPT35_TURBO.to_string()
}
fn default_chat_timeout_secs() -> u64 {
    120
}

impl EmbeddingConfig {
    /// Hosted and self-hosted providers cannot infer model or dims.
    pub fn requires_explicit_model(&self) -> bool {
        matches!(self.provider.as_str(), "openai" | "ollama")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.search_limit < 1 {
        anyhow::bail!("retrieval.search_limit must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.requires_explicit_model() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() {
            anyhow::bail!(
                "embedding.dims must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate chat
    match config.chat.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown chat provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.chat.model.trim().is_empty() {
        anyhow::bail!("chat.model must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[db]\npath = \"rag.sqlite\"\n").unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.retrieval.k, 20);
        assert_eq!(config.retrieval.search_limit, 5);
        assert_eq!(config.retrieval.metric, DistanceMetric::L2);
        assert_eq!(config.chat.provider, "openai");
        assert_eq!(config.chat.model, GPT35_TURBO);
        assert_eq!(config.corpus.path, PathBuf::from("./data/tsa_rules.txt"));
    }

    #[test]
    fn test_openai_embedding_requires_model_and_dims() {
        let err = parse(
            r#"
[db]
path = "rag.sqlite"

[embedding]
provider = "openai"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let ok = parse(
            r#"
[db]
path = "rag.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
"#,
        )
        .unwrap();
        assert_eq!(ok.embedding.dims, Some(1536));
    }

    #[test]
    fn test_metric_parsed_lowercase() {
        let config = parse(
            r#"
[db]
path = "rag.sqlite"

[retrieval]
metric = "cosine"
k = 3
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.metric, DistanceMetric::Cosine);
        assert_eq!(config.retrieval.k, 3);
    }

    #[test]
    fn test_rejects_zero_k() {
        let err = parse("[db]\npath = \"x\"\n[retrieval]\nk = 0\n").unwrap_err();
        assert!(err.to_string().contains("retrieval.k"));
    }

    #[test]
    fn test_rejects_unknown_providers() {
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"cohere\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[chat]\nprovider = \"bard\"\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_metric() {
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\nmetric = \"hamming\"\n").is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
