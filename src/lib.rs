//! # Course RAG
//!
//! A retrieval-augmented chatbot backend for course materials.
//!
//! Course documents are parsed into lessons, chunked, embedded and stored
//! in two SQLite-backed collections: a catalog with one entry per course
//! and a content collection with one entry per chunk. Questions go to
//! Claude together with two tools (content search and course outline);
//! the model decides whether to call one, and the answer comes back with
//! the sources the tool surfaced.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ docs/*.txt │──▶│ Parse+Chunk  │──▶│   SQLite     │
//! │            │   │   +Embed     │   │ catalog+chunks│
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │
//!                       ┌────────────────────┤
//!                       ▼                    ▼
//!                 ┌───────────┐        ┌───────────┐
//!                 │ RagSystem │◀──────▶│   Tools   │
//!                 │  + Claude │        │search/outline│
//!                 └─────┬─────┘        └───────────┘
//!                       │
//!              ┌────────┴────────┐
//!              ▼                 ▼
//!         ┌─────────┐      ┌──────────┐
//!         │   CLI   │      │   HTTP   │
//!         └─────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! course-rag init                  # create database
//! course-rag ingest --path ./docs  # index course documents
//! course-rag ask "What does lesson 2 of MCP cover?"
//! course-rag serve                 # HTTP API + chat UI
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`embedding`] | Embedding providers |
//! | [`vector_store`] | Course catalog and content search |
//! | [`ingest`] | Folder ingestion |
//! | [`tools`] | Tools exposed to the model |
//! | [`llm`] | Anthropic Messages API client |
//! | [`generator`] | Prompting and the tool round |
//! | [`session`] | Conversation history |
//! | [`rag`] | Query façade |
//! | [`server`] | HTTP API and static UI |
//! | [`stats`] | Index statistics |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod db;
pub mod embedding;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod rag;
pub mod server;
pub mod session;
pub mod stats;
pub mod tools;
pub mod vector_store;
