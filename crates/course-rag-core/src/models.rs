//! Core data models shared by ingestion, retrieval, and the HTTP API.
//!
//! A [`Course`] is identified by its title. Titles are the primary key for
//! de-duplication in the catalog, so two documents with the same title are
//! treated as the same course.

use serde::{Deserialize, Serialize};

/// One lesson inside a course document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number from the `Lesson N:` marker. `None` for the single
    /// unnumbered lesson of a document without markers.
    pub lesson_number: Option<i64>,
    pub title: String,
    pub lesson_link: Option<String>,
    /// Lesson body text. Not serialized into catalog metadata.
    #[serde(skip)]
    pub content: String,
}

/// A parsed course document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A chunk of lesson text stored in the course content index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseChunk {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    /// Course-wide sequence number, unique and increasing across lessons.
    pub chunk_index: i64,
    pub content: String,
}

impl CourseChunk {
    /// Record key in the content collection: `{course_title}_{chunk_index}`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.course_title, self.chunk_index)
    }
}

/// Metadata attached to every content search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
}

/// Result set of a content search.
///
/// `documents`, `metadata`, and `distances` are parallel vectors ordered by
/// ascending distance. A populated `error` means the search did not run (or
/// failed) and the vectors are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// An empty result set carrying an error message.
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Iterate `(document, metadata, distance)` triples in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(self.metadata.iter())
            .zip(self.distances.iter())
            .map(|((d, m), s)| (d.as_str(), m, *s))
    }
}

/// A source citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display label, e.g. `"Intro to MCP - Lesson 2"`.
    pub text: String,
    pub link: Option<String>,
}

/// Course structure returned by the outline tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseOutline {
    pub course_title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}
