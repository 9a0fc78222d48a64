//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`] and validated before anything
//! touches the database or the network. Every section except `[db]` has
//! defaults, so a minimal config is:
//!
//! ```toml
//! [db]
//! path = "./data/course-rag.sqlite"
//! ```
//!
//! Secrets never live in the file. API keys come from the environment
//! (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`), optionally seeded from `.env`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Content chunks returned per search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Reject course-name matches below this cosine similarity.
    /// Unset means the nearest course is always accepted.
    #[serde(default)]
    pub min_course_similarity: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_course_similarity: None,
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Exchanges (user + assistant pairs) kept per session.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `openai`, or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
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
            timeout_secs: default_timeout_secs(),
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
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Static chat UI served at `/`. Not served when the directory is missing.
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            frontend_dir: default_frontend_dir(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_frontend_dir() -> PathBuf {
    PathBuf::from("./frontend")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    /// Folder scanned for course documents.
    #[serde(default = "default_docs_path")]
    pub path: PathBuf,
    /// Ingest `path` before `serve` binds its listener.
    #[serde(default = "default_true")]
    pub ingest_on_startup: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            path: default_docs_path(),
            ingest_on_startup: true,
        }
    }
}

fn default_docs_path() -> PathBuf {
    PathBuf::from("./docs")
}
fn default_true() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.max_results < 1 {
        bail!("retrieval.max_results must be >= 1");
    }
    if let Some(floor) = config.retrieval.min_course_similarity {
        if !(-1.0..=1.0).contains(&floor) {
            bail!("retrieval.min_course_similarity must be in [-1.0, 1.0]");
        }
    }

    if config.session.max_history < 1 {
        bail!("session.max_history must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }

    Ok(())
}
