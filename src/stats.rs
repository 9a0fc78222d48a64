//! Index statistics.
//!
//! A quick look at what has been ingested: course and chunk counts, chunks
//! per course, and when each course was added. Used by `course-rag stats`
//! to check that an ingest run did what was expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Per-course breakdown of the content collection.
struct CourseStats {
    title: String,
    lesson_count: i64,
    chunk_count: i64,
    ingested_at: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let total_courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_catalog")
        .fetch_one(&pool)
        .await?;

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_content")
        .fetch_one(&pool)
        .await?;

    let orphan_chunks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_content WHERE course_title NOT IN (SELECT title FROM course_catalog)",
    )
    .fetch_one(&pool)
    .await?;

    let index_embedder: Option<(String, i64)> =
        sqlx::query_as("SELECT model, dims FROM embedding_meta WHERE id = 1")
            .fetch_optional(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Course RAG: Index Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Embedding:   {}", config.embedding.provider);
    if let Some((model, dims)) = &index_embedder {
        println!("  Index built: {} ({} dims)", model, dims);
    }
    println!();
    println!("  Courses:     {}", total_courses);
    println!("  Chunks:      {}", total_chunks);
    if orphan_chunks > 0 {
        println!(
            "  Unfinished:  {} chunks without a catalog entry (re-run ingest)",
            orphan_chunks
        );
    }

    let rows = sqlx::query(
        r#"
        SELECT
            c.title,
            c.lesson_count,
            c.ingested_at,
            COUNT(cc.id) AS chunk_count
        FROM course_catalog c
        LEFT JOIN course_content cc ON cc.course_title = c.title
        GROUP BY c.title
        ORDER BY c.title
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let courses: Vec<CourseStats> = rows
        .iter()
        .map(|row| CourseStats {
            title: row.get("title"),
            lesson_count: row.get("lesson_count"),
            chunk_count: row.get("chunk_count"),
            ingested_at: row.get("ingested_at"),
        })
        .collect();

    if !courses.is_empty() {
        println!();
        println!("  By course:");
        println!(
            "  {:<40} {:>7} {:>8}   {}",
            "COURSE", "LESSONS", "CHUNKS", "INGESTED"
        );
        println!("  {}", "-".repeat(76));

        for c in &courses {
            println!(
                "  {:<40} {:>7} {:>8}   {}",
                truncate_title(&c.title, 40),
                c.lesson_count,
                c.chunk_count,
                format_ts_relative(c.ingested_at)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now ("3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    match delta {
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86400 => plural(d / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
