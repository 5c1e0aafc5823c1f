pub mod chunk;
pub mod language;

pub use chunk::{Chunk, ChunkKind, ChunkMetadata, ExistingChunk, compute_chunk_hash, compute_content_hash};
pub use language::{Language, is_doc_extension, is_markdown_extension};
