//! Vector store interface.
//!
//! The pipeline depends on this trait only; the LanceDB implementation in
//! `lance` is the default store, and tests may substitute an in-memory
//! one. Records are keyed by stable chunk id; a record with an empty
//! vector is a permitted partial write meaning "needs embedding".

pub mod lance;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Chunk, ChunkKind, ChunkMetadata, ExistingChunk};

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Vector store error: {0}")]
  Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A chunk as written to the store.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
  pub id: Uuid,
  pub path: String,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub content_hash: String,
  pub chunk_hash: String,
  /// Empty means "no embedding yet".
  pub vector: Vec<f32>,
  pub metadata: Option<ChunkMetadata>,
}

impl ChunkRecord {
  pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
    Self {
      id: chunk.id,
      path: chunk.path.clone(),
      text: chunk.text.clone(),
      start_line: chunk.start_line,
      end_line: chunk.end_line,
      content_hash: chunk.content_hash.clone(),
      chunk_hash: chunk.chunk_hash.clone(),
      vector,
      metadata: chunk.metadata.clone(),
    }
  }
}

/// A chunk as read back from a similarity search.
#[derive(Debug, Clone)]
pub struct StoredChunk {
  pub id: Uuid,
  pub path: String,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub content_hash: String,
  pub chunk_hash: String,
  pub kind: Option<ChunkKind>,
  pub name: Option<String>,
  pub language: Option<String>,
  pub docstring: Option<String>,
  pub header_path: Option<String>,
}

/// Span rewrite for a moved chunk: identity and vector are untouched.
#[derive(Debug, Clone)]
pub struct SpanUpdate {
  pub id: Uuid,
  pub path: String,
  pub start_line: u32,
  pub end_line: u32,
  pub content_hash: String,
}

/// The nearest-neighbor store contract the pipeline assumes.
#[async_trait]
pub trait VectorStore: Send + Sync {
  async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;
  async fn delete_by_path(&self, path: &str) -> Result<()>;
  async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<()>;
  /// Rewrite line spans / path / content hash for moved chunks.
  async fn update_spans(&self, updates: &[SpanUpdate]) -> Result<()>;
  async fn get_by_path(&self, path: &str) -> Result<Vec<ExistingChunk>>;
  async fn indexed_paths(&self) -> Result<Vec<String>>;
  async fn search_by_vector(&self, vector: &[f32], top_k: usize, filter: Option<&str>) -> Result<Vec<(StoredChunk, f32)>>;
  async fn count_chunks(&self) -> Result<usize>;
  async fn storage_size(&self) -> Result<u64>;
  async fn close(&self) -> Result<()>;
}
