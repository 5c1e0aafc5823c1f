//! Chunking: turning a file's text into ordered chunks with line spans.
//!
//! Dispatch order for a file:
//! 1. markdown docs -> `markdown` structural chunker
//! 2. other docs -> `character` splitter with prose presets
//! 3. AST-supported code -> `ast` chunker (falls through when the parse
//!    yields nothing)
//! 4. code with boundary patterns -> `code_aware` splitter (falls through
//!    for oversized boundary-less files)
//! 5. everything else -> `character` splitter with code presets
//!
//! The dispatcher wraps the splitter output into [`Chunk`]s, assigning a
//! fresh UUID, the sanitized relative path, the file's content hash, and
//! the whitespace-normalized chunk hash.

#[cfg(feature = "ast")]
pub mod ast;
pub mod character;
pub mod code_aware;
pub mod markdown;
#[cfg(feature = "ast")]
pub mod symbols;

use uuid::Uuid;

use crate::{
  domain::{
    Chunk, ChunkMetadata, Language, compute_chunk_hash, compute_content_hash, is_markdown_extension,
    language::is_doc_file,
  },
  policy::sanitize::sanitize_path,
};

/// Splitter output before identity is assigned.
#[derive(Debug, Clone)]
pub struct RawChunk {
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub metadata: Option<ChunkMetadata>,
}

/// The chunking dispatcher.
#[derive(Debug, Clone, Default)]
pub struct Chunker;

impl Chunker {
  pub fn new() -> Self {
    Self
  }

  /// Chunk a file. Deterministic for a given `(rel_path, text)` up to the
  /// freshly minted chunk ids.
  pub fn chunk_file(&self, rel_path: &str, text: &str) -> Vec<Chunk> {
    let clean_path = sanitize_path(rel_path);
    let content_hash = compute_content_hash(text.as_bytes());
    let raw = self.split(&clean_path, text);

    raw
      .into_iter()
      .filter(|r| !r.text.trim().is_empty())
      .map(|r| Chunk {
        id: Uuid::new_v4(),
        path: clean_path.clone(),
        chunk_hash: compute_chunk_hash(&r.text),
        content_hash: content_hash.clone(),
        text: r.text,
        start_line: r.start_line,
        end_line: r.end_line,
        metadata: r.metadata,
      })
      .collect()
  }

  fn split(&self, rel_path: &str, text: &str) -> Vec<RawChunk> {
    let ext = rel_path.rsplit('.').next().unwrap_or("");

    if is_doc_file(rel_path) {
      if is_markdown_extension(ext) {
        return markdown::split(text);
      }
      return character::split(text, &character::SplitterConfig::prose());
    }

    let language = Language::from_path(rel_path);

    #[cfg(feature = "ast")]
    if let Some(lang) = language
      && ast::supports_language(lang)
      && let Some(chunks) = ast::split(text, lang)
    {
      return chunks;
    }

    if let Some(lang) = language
      && code_aware::supports_language(lang)
      && let Some(chunks) = code_aware::split(text, lang)
    {
      return self.tag_language(chunks, lang);
    }

    let chunks = character::split(text, &character::SplitterConfig::code());
    match language {
      Some(lang) => self.tag_language(chunks, lang),
      None => chunks,
    }
  }

  /// Attach the language to untagged chunks so query filters work for
  /// non-AST files too.
  fn tag_language(&self, mut chunks: Vec<RawChunk>, language: Language) -> Vec<RawChunk> {
    for chunk in &mut chunks {
      let meta = chunk.metadata.get_or_insert_with(ChunkMetadata::default);
      if meta.language.is_none() {
        meta.language = Some(language);
      }
    }
    chunks
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_markdown_routes_to_sections() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("README.md", "# Title\n\nbody text\n");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.starts_with("[Title]"));
  }

  #[test]
  fn test_plain_text_routes_to_prose() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("notes.txt", "some plain notes\n");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].metadata.is_none());
  }

  #[cfg(feature = "ast")]
  #[test]
  fn test_code_routes_to_ast() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("src/lib.rs", "pub fn alpha() {}\n\npub fn beta() {}\n");
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].metadata.as_ref().unwrap().name.is_some());
  }

  #[test]
  fn test_wrapper_assigns_identity() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("src/x.rs", "pub fn thing() {}\n");
    assert_eq!(chunks.len(), 1);
    let c = &chunks[0];
    assert_eq!(c.path, "src/x.rs");
    assert!(!c.id.is_nil());
    assert_eq!(c.content_hash.len(), 64);
    assert_eq!(c.chunk_hash.len(), 64);
    assert!(c.start_line <= c.end_line);
  }

  #[test]
  fn test_chunk_hashes_deterministic() {
    let chunker = Chunker::new();
    let text = "fn one() {}\n\nfn two() {}\n";
    let a: Vec<String> = chunker.chunk_file("a.rs", text).into_iter().map(|c| c.chunk_hash).collect();
    let b: Vec<String> = chunker.chunk_file("a.rs", text).into_iter().map(|c| c.chunk_hash).collect();
    assert_eq!(a, b);
  }

  #[test]
  fn test_ids_are_unique_per_call() {
    let chunker = Chunker::new();
    let text = "fn one() {}\n\nfn two() {}\n";
    let a = chunker.chunk_file("a.rs", text);
    let b = chunker.chunk_file("a.rs", text);
    assert_ne!(a[0].id, b[0].id, "ids are minted fresh each chunking");
  }

  #[test]
  fn test_path_sanitized() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("src\\win\u{200B}dows.rs", "fn f() {}\n");
    assert_eq!(chunks[0].path, "src/windows.rs");
  }

  #[test]
  fn test_windows_path_doc_detection() {
    let chunker = Chunker::new();
    let chunks = chunker.chunk_file("docs\\guide.md", "# G\n\nbody\n");
    assert!(chunks[0].text.starts_with("[G]"));
  }
}
