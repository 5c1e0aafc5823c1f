//! quarry: a project-scoped hybrid code and docs search index.
//!
//! Turns a source tree into a searchable lexical + semantic corpus, keeps
//! it incrementally in sync as files change, and answers ranked queries.
//! Designed to be embedded in developer tooling and run locally against a
//! single project directory.

pub mod chunker;
pub mod config;
pub mod diff;
pub mod docs;
pub mod domain;
pub mod embedding;
pub mod fingerprint;
pub mod fts;
pub mod index;
pub mod integrity;
pub mod policy;
pub mod project;
pub mod query;
pub mod store;
pub mod watcher;

pub use config::ProjectConfig;
pub use domain::{Chunk, ChunkKind, ChunkMetadata, Language};
pub use index::{IndexManager, IndexMetadata};
pub use project::find_project_root;
pub use query::{SearchOptions, SearchResponse, hybrid_search};
