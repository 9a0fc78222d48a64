//! Schema for the two course collections.
//!
//! | Table | Key | Holds |
//! |-------|-----|-------|
//! | `course_catalog` | `title` | one row per course, title embedding, lessons as JSON |
//! | `course_content` | `{course_title}_{chunk_index}` | one row per chunk with its embedding |
//! | `embedding_meta` | `id = 1` | model and dimensionality every stored vector was produced with |
//!
//! Every statement is idempotent, so migrations run on every connect.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_catalog (
            title TEXT PRIMARY KEY,
            instructor TEXT,
            course_link TEXT,
            lessons_json TEXT NOT NULL DEFAULT '[]',
            lesson_count INTEGER NOT NULL DEFAULT 0,
            embedding BLOB NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_content (
            id TEXT PRIMARY KEY,
            course_title TEXT NOT NULL,
            lesson_number INTEGER,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embedding_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            model TEXT NOT NULL,
            dims INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_content_course ON course_content(course_title, lesson_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
