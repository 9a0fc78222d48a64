//! # Course RAG CLI (`course-rag`)
//!
//! ## Usage
//!
//! ```bash
//! course-rag --config ./config/course-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `course-rag init` | Create the SQLite database and run schema migrations |
//! | `course-rag ingest` | Index course documents from `docs.path` (or `--path`) |
//! | `course-rag serve` | Start the HTTP API and chat UI |
//! | `course-rag ask "<question>"` | Answer one question from the terminal |
//! | `course-rag stats` | Show what is indexed |
//!
//! `ANTHROPIC_API_KEY` (and `OPENAI_API_KEY` for the OpenAI embedder) are
//! read from the environment; a `.env` file in the working directory is
//! loaded first if present.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use course_rag::config::{self, Config};
use course_rag::embedding::create_embedder;
use course_rag::rag::RagSystem;
use course_rag::vector_store::VectorStore;
use course_rag::{db, ingest, logging, migrate, server, stats};

/// Course RAG: ask questions about course materials.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/course-rag.toml` for an example.
#[derive(Parser)]
#[command(
    name = "course-rag",
    about = "Course RAG: a retrieval-augmented chatbot backend for course materials",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/course-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index course documents.
    ///
    /// Courses whose title is already indexed are skipped unless `--clear`
    /// is given.
    Ingest {
        /// Folder to scan instead of `docs.path`.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Wipe the catalog and content collections first.
        #[arg(long)]
        clear: bool,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`. When `docs.ingest_on_startup` is set the
    /// docs folder is ingested before the listener opens.
    Serve,

    /// Ask a single question and print the answer with its sources.
    Ask {
        /// The question.
        query: String,
    },

    /// Show course and chunk counts.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, clear } => {
            let store = open_store(&cfg).await?;
            ingest::run_ingest(&cfg, &store, path, clear).await?;
        }
        Commands::Serve => {
            let rag = Arc::new(RagSystem::from_config(cfg).await?);
            let docs = &rag.config().docs;
            if docs.ingest_on_startup {
                let report = rag.add_course_folder(&docs.path, false).await?;
                tracing::info!(
                    courses = report.courses_added,
                    chunks = report.chunks_added,
                    skipped = report.skipped,
                    failed = report.failed,
                    "startup ingest finished"
                );
            }
            server::run_server(rag).await?;
        }
        Commands::Ask { query } => {
            let rag = RagSystem::from_config(cfg).await?;
            let outcome = rag.query(&query, None).await?;
            println!("{}", outcome.answer);
            if !outcome.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &outcome.sources {
                    match &source.link {
                        Some(link) => println!("  - {} ({})", source.text, link),
                        None => println!("  - {}", source.text),
                    }
                }
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

/// Embedder and store only; ingesting does not need an LLM key.
async fn open_store(cfg: &Config) -> Result<VectorStore> {
    let embedder = create_embedder(&cfg.embedding)?;
    VectorStore::open(cfg, embedder).await
}
