//! Course folder ingestion.
//!
//! Flow per document: parse → skip if the title is already indexed →
//! chunk → store chunks → store catalog entry. The catalog entry is
//! written last, so a document that fails part-way is retried on the
//! next run instead of being left half-indexed and marked done.
//!
//! Per-document failures are logged and counted; the rest of the folder
//! still ingests.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use course_rag_core::chunk::chunk_course;
use course_rag_core::parse::parse_course_file;

use crate::config::{ChunkingConfig, Config};
use crate::vector_store::VectorStore;

/// Extensions picked up by a folder scan.
const COURSE_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Documents whose course title was already indexed.
    pub skipped: usize,
    /// Documents that could not be read, parsed, or stored.
    pub failed: usize,
}

/// What happened to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Added { title: String, chunks: usize },
    Skipped { title: String },
}

/// Course documents directly inside `folder`, sorted by file name.
pub fn course_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to scan {}", folder.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| COURSE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Ingest one document unless its title is in `known`.
///
/// On success the title is added to `known`.
pub async fn add_course_document(
    store: &VectorStore,
    path: &Path,
    chunking: &ChunkingConfig,
    known: &mut HashSet<String>,
) -> Result<DocumentOutcome> {
    let course = parse_course_file(path)?;
    if known.contains(&course.title) {
        return Ok(DocumentOutcome::Skipped {
            title: course.title,
        });
    }

    let chunks = chunk_course(&course, chunking.chunk_size, chunking.chunk_overlap);
    let stored = store
        .add_course_content(&chunks)
        .await
        .with_context(|| format!("Failed to store chunks for '{}'", course.title))?;
    store.add_course_metadata(&course).await?;

    known.insert(course.title.clone());
    Ok(DocumentOutcome::Added {
        title: course.title,
        chunks: stored,
    })
}

/// Ingest every course document in `folder`.
///
/// With `clear_existing`, both collections are wiped first. A missing
/// folder is logged and yields an empty report. An index built by a
/// different embedder is an error unless `clear_existing` is set.
pub async fn add_course_folder(
    store: &VectorStore,
    folder: &Path,
    chunking: &ChunkingConfig,
    clear_existing: bool,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    if !folder.is_dir() {
        tracing::warn!(folder = %folder.display(), "course folder does not exist");
        return Ok(report);
    }

    if clear_existing {
        tracing::info!("clearing existing course data");
        store.clear_all_data().await?;
    }
    store.check_embedder().await?;

    let mut known: HashSet<String> = store.existing_course_titles().await?.into_iter().collect();

    for path in course_files(folder)? {
        match add_course_document(store, &path, chunking, &mut known).await {
            Ok(DocumentOutcome::Added { title, chunks }) => {
                tracing::info!(course = %title, chunks, "added course");
                report.courses_added += 1;
                report.chunks_added += chunks;
            }
            Ok(DocumentOutcome::Skipped { title }) => {
                tracing::info!(course = %title, "course already exists, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %format!("{:#}", e), "failed to ingest document");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// CLI entry point: ingest `folder` (or `docs.path`) and print a summary.
pub async fn run_ingest(
    config: &Config,
    store: &VectorStore,
    folder: Option<PathBuf>,
    clear_existing: bool,
) -> Result<IngestReport> {
    let folder = folder.unwrap_or_else(|| config.docs.path.clone());
    let report = add_course_folder(store, &folder, &config.chunking, clear_existing).await?;

    println!("ingest {}", folder.display());
    println!("  courses added: {}", report.courses_added);
    println!("  chunks added: {}", report.chunks_added);
    println!("  skipped (already indexed): {}", report.skipped);
    println!("  failed: {}", report.failed);
    Ok(report)
}
