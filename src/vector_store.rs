//! Course vector index on SQLite.
//!
//! Two collections share one database:
//!
//! - **course catalog**: one row per course. The embedded title drives
//!   fuzzy course-name resolution; lessons ride along as JSON metadata.
//! - **course content**: one row per chunk, keyed `{course_title}_{chunk_index}`.
//!
//! Vectors are stored as little-endian f32 BLOBs and ranked in Rust with
//! brute-force cosine similarity. Filters on course title and lesson number
//! are pushed into SQL before ranking.
//!
//! ```text
//! search(query, course_name?, lesson?)
//!     │
//!     ├─ course_name? ── resolve_course_name ── None ──▶ "No course found matching '…'"
//!     │                        │
//!     │                   canonical title
//!     ▼                        ▼
//!  embed(query) ──▶ SELECT … WHERE <filter> ──▶ rank by cosine ──▶ top max_results
//! ```
//!
//! [`VectorStore::search`] never returns `Err`. Store and embedding
//! failures come back as a [`SearchResults`] carrying `Search error: …`.
//!
//! The first write records the embedder's model name and dimensionality in
//! `embedding_meta`. Vectors from different models are not comparable, so
//! every read and write checks the active embedder against that record and
//! refuses to run on a mismatch until the index is cleared.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use course_rag_core::models::{ChunkMetadata, Course, CourseChunk, CourseOutline, Lesson, SearchResults};

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_distance, cosine_similarity, vec_to_blob, Embedder};
use crate::migrate;

/// Equality filter over the content collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<i64>,
}

impl SearchFilter {
    pub fn new(course_title: Option<String>, lesson_number: Option<i64>) -> Self {
        Self {
            course_title,
            lesson_number,
        }
    }

    /// SQL predicate for this filter, or `None` when unfiltered.
    /// Both constraints present combine with `AND`.
    pub fn where_clause(&self) -> Option<&'static str> {
        match (&self.course_title, self.lesson_number) {
            (None, None) => None,
            (Some(_), None) => Some("course_title = ?"),
            (None, Some(_)) => Some("lesson_number = ?"),
            (Some(_), Some(_)) => Some("course_title = ? AND lesson_number = ?"),
        }
    }
}

pub struct VectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    min_course_similarity: Option<f32>,
}

impl VectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        Self {
            pool,
            embedder,
            max_results,
            min_course_similarity: None,
        }
    }

    /// Reject course-name matches whose similarity is below `floor`.
    pub fn with_min_course_similarity(mut self, floor: Option<f32>) -> Self {
        self.min_course_similarity = floor;
        self
    }

    /// Connect to the configured database, run migrations, and build a store.
    pub async fn open(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store = Self::new(pool, embedder, config.retrieval.max_results)
            .with_min_course_similarity(config.retrieval.min_course_similarity);
        // Not fatal here: `ingest --clear` has to be able to open the index.
        if let Err(e) = store.check_embedder().await {
            tracing::warn!(error = %e, "embedder does not match the index");
        }
        Ok(store)
    }

    // ============ Embedder bookkeeping ============

    /// Model name and dimensionality the stored vectors were produced
    /// with, or `None` for an index that has never been written.
    pub async fn index_embedder(&self) -> Result<Option<(String, usize)>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT model, dims FROM embedding_meta WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(model, dims)| (model, dims as usize)))
    }

    /// Fail when the index was built by a different embedder than the
    /// one this store holds.
    pub async fn check_embedder(&self) -> Result<()> {
        let Some((model, dims)) = self.index_embedder().await? else {
            return Ok(());
        };
        let active_model = self.embedder.model_name();
        let active_dims = self.embedder.dims();
        if model != active_model || dims != active_dims {
            anyhow::bail!(
                "Index was built with {}/{} but the configured embedder is {}/{}; \
                 re-run `course-rag ingest --clear` to rebuild it",
                model,
                dims,
                active_model,
                active_dims
            );
        }
        Ok(())
    }

    async fn record_embedder<'e, E>(&self, executor: E) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("INSERT OR IGNORE INTO embedding_meta (id, model, dims) VALUES (1, ?, ?)")
            .bind(self.embedder.model_name())
            .bind(self.embedder.dims() as i64)
            .execute(executor)
            .await?;
        Ok(())
    }

    // ============ Search ============

    /// Semantic search over course content.
    ///
    /// A `course_name` is resolved to a canonical title first. When it does
    /// not resolve, the result carries `No course found matching '{name}'`
    /// and no content query runs. `limit` overrides the configured
    /// result count.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> SearchResults {
        let limit = limit.unwrap_or(self.max_results);
        if limit == 0 {
            return SearchResults::default();
        }
        if let Err(e) = self.check_embedder().await {
            tracing::warn!(error = %e, "search refused");
            return SearchResults::empty(format!("Search error: {}", e));
        }

        let course_title = match course_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => match self.resolve_course_name(name).await {
                Some(title) => Some(title),
                None => return SearchResults::empty(format!("No course found matching '{}'", name)),
            },
            None => None,
        };

        let filter = SearchFilter::new(course_title, lesson_number);
        match self.query_content(query, &filter, limit).await {
            Ok(results) => {
                tracing::debug!(
                    query,
                    course = filter.course_title.as_deref(),
                    lesson = filter.lesson_number,
                    hits = results.len(),
                    "content search"
                );
                results
            }
            Err(e) => {
                tracing::warn!(error = %e, "content search failed");
                SearchResults::empty(format!("Search error: {}", e))
            }
        }
    }

    async fn query_content(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<SearchResults> {
        let query_vec = self.embedder.embed_one(query).await?;

        let mut sql = String::from(
            "SELECT course_title, lesson_number, chunk_index, content, embedding FROM course_content",
        );
        if let Some(clause) = filter.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        sql.push_str(" ORDER BY course_title, chunk_index");

        let mut q = sqlx::query(&sql);
        if let Some(title) = &filter.course_title {
            q = q.bind(title);
        }
        if let Some(n) = filter.lesson_number {
            q = q.bind(n);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut scored: Vec<(f32, String, ChunkMetadata)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let distance = cosine_distance(&query_vec, &blob_to_vec(&blob));
                let meta = ChunkMetadata {
                    course_title: row.get("course_title"),
                    lesson_number: row.get("lesson_number"),
                    chunk_index: row.get("chunk_index"),
                };
                (distance, row.get("content"), meta)
            })
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut results = SearchResults::default();
        for (distance, content, meta) in scored {
            results.distances.push(distance);
            results.documents.push(content);
            results.metadata.push(meta);
        }
        Ok(results)
    }

    /// Map free text to the nearest canonical course title.
    ///
    /// `None` when the catalog is empty, the lookup fails (including an
    /// embedder mismatch), or the best match falls under the configured
    /// similarity floor.
    pub async fn resolve_course_name(&self, name: &str) -> Option<String> {
        match self.nearest_course(name).await {
            Ok(Some((title, similarity))) => {
                if let Some(floor) = self.min_course_similarity {
                    if similarity < floor {
                        tracing::debug!(name, %title, similarity, "course match below floor");
                        return None;
                    }
                }
                Some(title)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(name, error = %e, "course name resolution failed");
                None
            }
        }
    }

    async fn nearest_course(&self, name: &str) -> Result<Option<(String, f32)>> {
        self.check_embedder().await?;
        let rows = sqlx::query("SELECT title, embedding FROM course_catalog ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let name_vec = self.embedder.embed_one(name).await?;
        let best = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let title: String = row.get("title");
                (title, cosine_similarity(&name_vec, &blob_to_vec(&blob)))
            })
            .fold(None::<(String, f32)>, |best, cand| match best {
                Some(b) if b.1 >= cand.1 => Some(b),
                _ => Some(cand),
            });
        Ok(best)
    }

    // ============ Writes ============

    /// Add a course to the catalog. Returns `false` when the title is
    /// already present, leaving the existing row untouched.
    pub async fn add_course_metadata(&self, course: &Course) -> Result<bool> {
        if self.course_exists(&course.title).await? {
            return Ok(false);
        }
        self.check_embedder().await?;

        let embedding = self
            .embedder
            .embed_one(&course.title)
            .await
            .with_context(|| format!("Failed to embed course title '{}'", course.title))?;
        let lessons_json = serde_json::to_string(&course.lessons)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO course_catalog
                (title, instructor, course_link, lessons_json, lesson_count, embedding, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&course.title)
        .bind(&course.instructor)
        .bind(&course.course_link)
        .bind(&lessons_json)
        .bind(course.lessons.len() as i64)
        .bind(vec_to_blob(&embedding))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;
        self.record_embedder(&mut *tx).await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Embed and store chunks. Existing records with the same key are replaced.
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.check_embedder().await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO course_content
                    (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.id())
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        self.record_embedder(&mut *tx).await?;
        tx.commit().await?;

        Ok(chunks.len())
    }

    /// Wipe both collections and forget which embedder built them.
    pub async fn clear_all_data(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM course_content").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM course_catalog").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM embedding_meta").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ============ Catalog reads ============

    pub async fn course_exists(&self, title: &str) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT title FROM course_catalog WHERE title = ?")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn existing_course_titles(&self) -> Result<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM course_catalog ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(titles)
    }

    pub async fn course_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_catalog")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_content")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    /// Catalog metadata for every course, ordered by title.
    pub async fn all_courses_metadata(&self) -> Result<Vec<CourseOutline>> {
        let rows = sqlx::query(
            "SELECT title, instructor, course_link, lessons_json FROM course_catalog ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(outline_from_row).collect()
    }

    /// Catalog metadata for one course by exact title.
    pub async fn course_outline(&self, title: &str) -> Result<Option<CourseOutline>> {
        let row = sqlx::query(
            "SELECT title, instructor, course_link, lessons_json FROM course_catalog WHERE title = ?",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(outline_from_row).transpose()
    }

    pub async fn course_link(&self, title: &str) -> Result<Option<String>> {
        let link: Option<Option<String>> =
            sqlx::query_scalar("SELECT course_link FROM course_catalog WHERE title = ?")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(link.flatten())
    }

    pub async fn lesson_link(&self, title: &str, lesson_number: i64) -> Result<Option<String>> {
        Ok(self.course_outline(title).await?.and_then(|outline| {
            outline
                .lessons
                .into_iter()
                .find(|l| l.lesson_number == Some(lesson_number))
                .and_then(|l| l.lesson_link)
        }))
    }
}

fn outline_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CourseOutline> {
    let title: String = row.get("title");
    let lessons_json: String = row.get("lessons_json");
    let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)
        .with_context(|| format!("Corrupt lesson metadata for course '{}'", title))?;
    Ok(CourseOutline {
        course_title: title,
        course_link: row.get("course_link"),
        instructor: row.get("instructor"),
        lessons,
    })
}
