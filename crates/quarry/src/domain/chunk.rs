use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::language::Language;

/// The kind of source construct a chunk represents.
///
/// Stored as a lowercase string at persistence boundaries; in memory it is a
/// proper sum type so ranking and filtering cannot typo a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
  Class,
  Function,
  Method,
  Interface,
  Impl,
  Struct,
  Enum,
  Trait,
  Type,
  Section,
  Other,
}

impl ChunkKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChunkKind::Class => "class",
      ChunkKind::Function => "function",
      ChunkKind::Method => "method",
      ChunkKind::Interface => "interface",
      ChunkKind::Impl => "impl",
      ChunkKind::Struct => "struct",
      ChunkKind::Enum => "enum",
      ChunkKind::Trait => "trait",
      ChunkKind::Type => "type",
      ChunkKind::Section => "section",
      ChunkKind::Other => "other",
    }
  }

  /// Parse a persisted kind string, normalizing known aliases.
  pub fn parse(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "class" => ChunkKind::Class,
      "function" | "func" | "fn" => ChunkKind::Function,
      "method" => ChunkKind::Method,
      "interface" => ChunkKind::Interface,
      "impl" => ChunkKind::Impl,
      "struct" => ChunkKind::Struct,
      "enum" => ChunkKind::Enum,
      "trait" => ChunkKind::Trait,
      "type" | "typealias" | "type_alias" => ChunkKind::Type,
      "section" => ChunkKind::Section,
      _ => ChunkKind::Other,
    }
  }
}

/// Structured metadata attached to chunks produced by the AST and markdown
/// chunkers. Character-split chunks carry no metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
  pub kind: Option<ChunkKind>,
  pub name: Option<String>,
  pub parent_name: Option<String>,
  pub language: Option<Language>,
  pub visibility: Option<String>,
  pub is_export: bool,
  pub is_async: bool,
  pub is_static: bool,
  pub docstring: Option<String>,
  #[serde(default)]
  pub decorators: Vec<String>,
  /// Breadcrumb path for markdown sections, e.g. "Guide > Setup".
  pub header_path: Option<String>,
  /// 1-based part index when an oversized node was re-split.
  pub part: Option<u32>,
  pub total_parts: Option<u32>,
}

/// An indivisible unit of indexed text with a stable id.
///
/// `text` is an exact substring of the source file. The id is minted once
/// (UUID v4) and preserved across reindexes for chunks whose normalized text
/// is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub id: Uuid,
  /// Project-relative path, forward slashes, NFC-normalized.
  pub path: String,
  pub text: String,
  /// 1-based, inclusive.
  pub start_line: u32,
  pub end_line: u32,
  /// Hash of the whole file's bytes; identical for all chunks of a file.
  pub content_hash: String,
  /// Hash of the whitespace-normalized chunk text; the diff equality key.
  pub chunk_hash: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<ChunkMetadata>,
}

impl Chunk {
  pub fn kind(&self) -> Option<ChunkKind> {
    self.metadata.as_ref().and_then(|m| m.kind)
  }

  pub fn name(&self) -> Option<&str> {
    self.metadata.as_ref().and_then(|m| m.name.as_deref())
  }
}

/// A chunk as read back from the vector store, with its embedding.
#[derive(Debug, Clone)]
pub struct ExistingChunk {
  pub id: Uuid,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub chunk_hash: String,
  pub vector: Vec<f32>,
}

/// SHA-256 of a file's full bytes, hex encoded.
pub fn compute_content_hash(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of whitespace-normalized chunk text.
///
/// Normalization collapses all whitespace runs to a single space so that
/// pure reformatting (indentation, trailing spaces, line wrapping) does not
/// force a re-embed.
pub fn compute_chunk_hash(text: &str) -> String {
  let normalized: Vec<&str> = text.split_whitespace().collect();
  hex::encode(Sha256::digest(normalized.join(" ").as_bytes()))
}
