//! # Course RAG Core
//!
//! Runtime-agnostic logic for Course RAG: course data models, the course
//! document parser, the sentence-aligned chunker, and the embedding trait.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Everything
//! here is deterministic and unit-testable in isolation.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod parse;
