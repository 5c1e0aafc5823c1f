//! Recursive character splitter, the fallback for files with no structure.
//!
//! Splits on an ordered separator list: the first separator whose pieces all
//! fit the chunk budget wins, and pieces are greedily packed into chunks
//! with a trailing-character overlap. The empty separator is the terminal
//! fallback and slices on plain character windows.

use super::RawChunk;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
  pub separators: Vec<&'static str>,
  /// Target chunk size in characters.
  pub chunk_size: usize,
  /// Trailing characters of the previous chunk repeated at the start of the
  /// next one.
  pub overlap: usize,
}

impl SplitterConfig {
  pub fn code() -> Self {
    Self {
      separators: vec!["\n\n", "\n", " ", ""],
      chunk_size: 4000,
      overlap: 800,
    }
  }

  pub fn prose() -> Self {
    Self {
      separators: vec!["\n\n", "\n", ". ", " ", ""],
      chunk_size: 8000,
      overlap: 2000,
    }
  }
}

/// Split `text` into overlapping chunks with line spans.
///
/// Every chunk's text is an exact substring of `text`. Line numbers are
/// reconstructed by counting newlines up to the chunk's byte offset.
pub fn split(text: &str, config: &SplitterConfig) -> Vec<RawChunk> {
  if text.is_empty() {
    return Vec::new();
  }

  if text.chars().count() <= config.chunk_size {
    return vec![make_chunk(text, 0, text.len())];
  }

  let boundaries = piece_boundaries(text, config);

  let mut chunks = Vec::new();
  let mut start = 0usize;

  loop {
    let end = pack_until(text, &boundaries, start, config.chunk_size);
    chunks.push(make_chunk(text, start, end));

    if end >= text.len() {
      break;
    }

    // Overlap: back up by `overlap` characters, aligned to a char boundary,
    // but always make forward progress.
    let mut next = char_floor(text, end.saturating_sub(config.overlap));
    if next <= start {
      next = end;
    }
    start = next;
  }

  chunks
}

/// Byte offsets of piece boundaries for the first workable separator.
fn piece_boundaries(text: &str, config: &SplitterConfig) -> Vec<usize> {
  for sep in &config.separators {
    if sep.is_empty() {
      break;
    }
    let mut offsets = Vec::new();
    let mut last = 0usize;
    let mut max_piece = 0usize;
    for (idx, _) in text.match_indices(sep) {
      let end = idx + sep.len();
      max_piece = max_piece.max(text[last..end].chars().count());
      offsets.push(end);
      last = end;
    }
    if last < text.len() {
      max_piece = max_piece.max(text[last..].chars().count());
      offsets.push(text.len());
    }
    if offsets.len() > 1 && max_piece <= config.chunk_size {
      return offsets;
    }
  }

  // Terminal fallback: character windows of chunk_size.
  let mut offsets = Vec::new();
  let mut count = 0usize;
  for (idx, c) in text.char_indices() {
    count += 1;
    if count == config.chunk_size {
      offsets.push(idx + c.len_utf8());
      count = 0;
    }
  }
  if offsets.last() != Some(&text.len()) {
    offsets.push(text.len());
  }
  offsets
}

/// Greedily extend from `start` across piece boundaries up to the budget.
fn pack_until(text: &str, boundaries: &[usize], start: usize, chunk_size: usize) -> usize {
  let first = boundaries.partition_point(|&b| b <= start);
  let mut end = start;
  let mut chars = 0usize;
  let mut counted_to = start;
  for &boundary in &boundaries[first..] {
    chars += text[counted_to..boundary].chars().count();
    counted_to = boundary;
    if chars > chunk_size {
      break;
    }
    end = boundary;
  }

  if end == start {
    // Single piece larger than the budget (can only happen at an overlap
    // restart); take a raw character window.
    let remaining = &text[start..];
    let take: usize = remaining
      .char_indices()
      .nth(chunk_size)
      .map(|(i, _)| i)
      .unwrap_or(remaining.len());
    end = start + take;
  }

  end
}

fn make_chunk(text: &str, start: usize, end: usize) -> RawChunk {
  let start_line = 1 + count_newlines(&text[..start]);
  let slice = &text[start..end];
  let mut end_line = start_line + count_newlines(slice);
  if slice.ends_with('\n') && end_line > start_line {
    end_line -= 1;
  }
  RawChunk {
    text: slice.to_string(),
    start_line,
    end_line,
    metadata: None,
  }
}

fn count_newlines(s: &str) -> u32 {
  s.bytes().filter(|&b| b == b'\n').count() as u32
}

/// Round a byte offset down to the nearest char boundary.
fn char_floor(text: &str, mut offset: usize) -> usize {
  while offset > 0 && !text.is_char_boundary(offset) {
    offset -= 1;
  }
  offset
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_small_text_single_chunk() {
    let chunks = split("hello world", &SplitterConfig::code());
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "hello world");
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 1);
  }

  #[test]
  fn test_empty_text() {
    assert!(split("", &SplitterConfig::code()).is_empty());
  }

  #[test]
  fn test_chunks_are_exact_substrings() {
    let text: String = (0..200)
      .map(|i| format!("line number {} with some padding text\n", i))
      .collect();
    let config = SplitterConfig {
      separators: vec!["\n\n", "\n", " ", ""],
      chunk_size: 500,
      overlap: 100,
    };

    let chunks = split(&text, &config);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
      assert!(text.contains(&chunk.text), "chunk must be an exact substring");
      assert!(chunk.text.chars().count() <= config.chunk_size);
    }
  }

  #[test]
  fn test_coverage_no_gaps() {
    // Consecutive chunks overlap or touch; nothing in the source is skipped.
    let text: String = (0..100).map(|i| format!("word{} ", i)).collect();
    let config = SplitterConfig {
      separators: vec![" ", ""],
      chunk_size: 80,
      overlap: 20,
    };

    let chunks = split(&text, &config);
    assert!(text.starts_with(&chunks[0].text));
    assert!(text.ends_with(&chunks[chunks.len() - 1].text));

    let mut covered_to = 0usize;
    let mut search_from = 0usize;
    for chunk in &chunks {
      let start = search_from + text[search_from..].find(&chunk.text).expect("chunk must appear in source");
      assert!(start <= covered_to, "gap before chunk starting at {start}");
      covered_to = covered_to.max(start + chunk.text.len());
      search_from = start + 1;
    }
    assert_eq!(covered_to, text.len());
  }

  #[test]
  fn test_line_numbers_monotonic() {
    let text: String = (0..300).map(|i| format!("fn f{}() {{}}\n", i)).collect();
    let config = SplitterConfig {
      separators: vec!["\n", ""],
      chunk_size: 200,
      overlap: 40,
    };

    let chunks = split(&text, &config);
    let mut prev_start = 0;
    for chunk in &chunks {
      assert!(chunk.start_line <= chunk.end_line);
      assert!(chunk.start_line >= prev_start);
      prev_start = chunk.start_line;
    }
  }

  #[test]
  fn test_determinism() {
    let text: String = (0..150).map(|i| format!("row {}\n", i)).collect();
    let config = SplitterConfig::prose();
    let a = split(&text, &config);
    let b = split(&text, &config);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
      assert_eq!(x.text, y.text);
      assert_eq!(x.start_line, y.start_line);
    }
  }

  #[test]
  fn test_no_separator_falls_back_to_windows() {
    let text = "x".repeat(10_000);
    let config = SplitterConfig {
      separators: vec!["\n\n", "\n", ""],
      chunk_size: 4000,
      overlap: 800,
    };
    let chunks = split(&text, &config);
    assert!(chunks.len() >= 3);
    for chunk in &chunks {
      assert!(chunk.text.chars().count() <= 4000);
    }
  }
}
