//! The query façade the HTTP layer and CLI talk to.
//!
//! Owns the vector store, tool registry, generator and session store, and
//! runs one query end to end:
//!
//! 1. pick or create the session
//! 2. render its history
//! 3. generate (at most one tool round)
//! 4. record the exchange

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use course_rag_core::models::Source;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generator::AiGenerator;
use crate::ingest::{self, IngestReport};
use crate::llm::{AnthropicClient, LlmClient};
use crate::session::SessionStore;
use crate::tools::ToolRegistry;
use crate::vector_store::VectorStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    config: Arc<Config>,
    store: Arc<VectorStore>,
    tools: ToolRegistry,
    generator: AiGenerator,
    sessions: SessionStore,
}

impl RagSystem {
    pub fn new(config: Arc<Config>, store: Arc<VectorStore>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            tools: ToolRegistry::with_course_tools(Arc::clone(&store)),
            generator: AiGenerator::new(llm),
            sessions: SessionStore::new(config.session.max_history),
            config,
            store,
        }
    }

    /// Build the production stack: configured embedder, SQLite store,
    /// Anthropic client.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store = VectorStore::open(&config, embedder).await?;
        let llm = AnthropicClient::from_config(&config.llm)?;
        Ok(Self::new(Arc::new(config), Arc::new(store), Arc::new(llm)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer a question. Without a session id a new session is created.
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryOutcome> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create_session(),
        };
        let history = self.sessions.get_conversation_history(&session_id);

        let generated = self
            .generator
            .generate_response(query, history.as_deref(), Some(&self.tools))
            .await?;

        self.sessions
            .add_exchange(&session_id, query, &generated.answer);

        Ok(QueryOutcome {
            answer: generated.answer,
            sources: generated.sources,
            session_id,
        })
    }

    pub async fn add_course_folder(&self, folder: &Path, clear_existing: bool) -> Result<IngestReport> {
        ingest::add_course_folder(&self.store, folder, &self.config.chunking, clear_existing).await
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.store.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}
