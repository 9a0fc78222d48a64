#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use course_rag::config::Config;
use course_rag::llm::{
    ContentBlock, LlmClient, LlmError, LlmRequest, LlmResponse, StopReason,
};
use course_rag::vector_store::VectorStore;
use course_rag::{db, migrate};
use course_rag_core::embedding::Embedder;

pub const DIMS: usize = 64;

/// Hashed bag-of-words embedder. Texts sharing words land close together,
/// which is enough to exercise ranking and course-name resolution offline.
pub struct BagOfWords;

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    hashed_words(text, DIMS)
}

fn hashed_words(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let idx = (fnv1a(&word.to_lowercase()) % dims as u64) as usize;
        v[idx] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Same model as [`BagOfWords`] hashed into a different number of buckets,
/// standing in for a reconfigured embedder.
pub struct ResizedBagOfWords(pub usize);

#[async_trait]
impl Embedder for ResizedBagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        self.0
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hashed_words(t, self.0)).collect())
    }
}

/// [`BagOfWords`] that records every text it is asked to embed.
#[derive(Default)]
pub struct RecordingEmbedder {
    seen: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    pub fn texts(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.seen.lock().unwrap().clear();
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    fn model_name(&self) -> &str {
        BagOfWords.model_name()
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        BagOfWords.embed(texts).await
    }
}

/// LLM double that replays canned responses and records every request.
pub struct ScriptedLlm {
    replies: Mutex<Vec<Result<LlmResponse, LlmError>>>,
    pub seen: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(mut replies: Vec<Result<LlmResponse, LlmError>>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }
}

pub fn text_reply(text: &str) -> Result<LlmResponse, LlmError> {
    Ok(LlmResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: Some(StopReason::EndTurn),
    })
}

pub fn tool_reply(id: &str, name: &str, input: Value) -> Result<LlmResponse, LlmError> {
    Ok(LlmResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        stop_reason: Some(StopReason::ToolUse),
    })
}

/// Tool results the model was sent on its second call, in order.
pub fn tool_results(request: &LlmRequest) -> Vec<String> {
    request
        .messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|b| match b {
            ContentBlock::ToolResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

pub const MCP_COURSE: &str = "\
Course Title: MCP: Build Rich-Context AI Apps with Anthropic
Course Link: https://example.com/mcp
Course Instructor: Elie Schoppik

Lesson 1: Why MCP
Lesson Link: https://example.com/mcp/lesson-1
The protocol separates hosts, clients and servers. Servers expose tools and resources.

Lesson 2: MCP Architecture
Lesson Link: https://example.com/mcp/lesson-2
Clients and servers exchange messages over a transport. The stdio transport runs the server as a subprocess.
";

pub const RUST_COURSE: &str = "\
Course Title: Introduction to Rust Programming
Course Link: https://example.com/rust
Course Instructor: Ferris Crab

Lesson 1: Ownership
Lesson Link: https://example.com/rust/lesson-1
Every value has a single owner. Borrowing lets code use a value without taking ownership.

Lesson 2: Traits
Traits describe shared behavior. Generic functions use trait bounds.
";

/// A scratch workspace: docs folder with both fixture courses and a config
/// pointing at a database inside it.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("mcp.txt"), MCP_COURSE).unwrap();
        fs::write(docs.join("rust.txt"), RUST_COURSE).unwrap();

        let config = config_for(dir.path());
        Self { dir, config }
    }

    pub fn docs(&self) -> std::path::PathBuf {
        self.dir.path().join("docs")
    }

    pub async fn store(&self) -> VectorStore {
        self.store_with(Arc::new(BagOfWords)).await
    }

    pub async fn store_with(&self, embedder: Arc<dyn Embedder>) -> VectorStore {
        let pool = db::connect(&self.config).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        VectorStore::new(pool, embedder, self.config.retrieval.max_results)
    }
}

pub fn config_for(root: &Path) -> Config {
    let toml_src = format!(
        r#"
[db]
path = "{root}/data/course-rag.sqlite"

[chunking]
chunk_size = 800
chunk_overlap = 100

[docs]
path = "{root}/docs"
ingest_on_startup = false

[server]
frontend_dir = "{root}/frontend"
"#,
        root = root.display()
    );
    toml::from_str(&toml_src).unwrap()
}
