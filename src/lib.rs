//! # askdoc
//!
//! A document ingestion and semantic retrieval engine for grounded
//! question answering.
//!
//! askdoc turns an uploaded file into a durable, searchable document record
//! (extracted text + generated synopsis + embedding vector) and later
//! serves similarity-ranked grounding context for natural-language
//! questions about it. The chat surface, auth, and upload UI are external
//! collaborators; this crate is the pipeline between them and the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────────┐   ┌──────────┐
//! │  Intake  │──▶│  Ingestion Pipeline               │──▶│  SQLite   │
//! │ (files)  │   │ Extract → Summarize → Embed → Put │   │  (BLOB    │
//! └──────────┘   └──────────────────────────────────┘   │  vectors) │
//!                                                        └────┬─────┘
//!                ┌──────────────────────────────────┐         │
//! question ─────▶│  Retrieval Engine                 │◀────────┘
//!                │ Embed query → cosine top-K        │──▶ grounding context
//!                └──────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Media-type-specific text extraction |
//! | [`summarize`] | Synopsis generation via chat completion |
//! | [`embedding`] | Embedding provider abstraction + vector utilities |
//! | [`upstream`] | Transient/fatal upstream outcomes and retry policy |
//! | [`store`] | Document store trait, SQLite and in-memory backends |
//! | [`ingest`] | Batch ingestion orchestration |
//! | [`retrieve`] | Query embedding and similarity-ranked retrieval |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod summarize;
pub mod upstream;
