//! Markdown structural chunker.
//!
//! Parses a document into a header-delimited section tree and emits one
//! chunk per section, prefixed with its breadcrumb (`[Guide > Setup]`).
//! Frontmatter is stripped (line offsets preserved), fenced code blocks are
//! opaque to header scanning, and both ATX (`#`) and setext (`===`/`---`)
//! headers are recognized. Oversized sections are sub-chunked on paragraph
//! boundaries with a "(continued)" marker on the follow-up parts.

use super::{RawChunk, character};
use crate::domain::{ChunkKind, ChunkMetadata, Language};

/// Maximum characters per emitted section chunk before sub-chunking.
const MAX_SECTION_CHARS: usize = 8000;

#[derive(Debug)]
struct Section {
  /// Header depth, 0 for the preamble before any header.
  level: usize,
  title: Option<String>,
  /// Breadcrumb of ancestor titles including this one.
  path: Vec<String>,
  /// 1-based line of the header (or first content line for the preamble).
  start_line: u32,
  end_line: u32,
  body: String,
}

/// Chunk a markdown document.
pub fn split(text: &str) -> Vec<RawChunk> {
  let (content_start_line, body) = strip_frontmatter(text);
  let sections = parse_sections(body, content_start_line);

  let mut chunks = Vec::new();
  for section in &sections {
    if section.body.trim().is_empty() {
      continue;
    }
    emit_section(section, &mut chunks);
  }
  chunks
}

/// Strip YAML (`---`) or TOML (`+++`) frontmatter.
///
/// Returns the 1-based line number where real content starts and the
/// remaining text.
fn strip_frontmatter(text: &str) -> (u32, &str) {
  for delim in ["---", "+++"] {
    let Some(rest) = text.strip_prefix(delim) else {
      continue;
    };
    if !rest.starts_with('\n') && !rest.starts_with("\r\n") {
      continue;
    }
    // Find the closing delimiter on its own line.
    let mut offset = delim.len();
    for line in rest.split_inclusive('\n') {
      offset += line.len();
      let trimmed = line.trim();
      if trimmed == delim && offset > delim.len() + line.len() {
        let skipped_lines = text[..offset].matches('\n').count() as u32;
        return (skipped_lines + 1, &text[offset..]);
      }
    }
    // Unterminated frontmatter: treat the document as plain content.
  }
  (1, text)
}

fn parse_sections(body: &str, first_line: u32) -> Vec<Section> {
  let lines: Vec<&str> = body.lines().collect();
  let mut sections: Vec<Section> = Vec::new();
  // Stack of (level, title) for breadcrumb construction.
  let mut stack: Vec<(usize, String)> = Vec::new();
  let mut fence: Option<&str> = None;

  let mut current = Section {
    level: 0,
    title: None,
    path: Vec::new(),
    start_line: first_line,
    end_line: first_line,
    body: String::new(),
  };

  let mut i = 0usize;
  while i < lines.len() {
    let line = lines[i];
    let line_no = first_line + i as u32;
    let trimmed = line.trim_start();

    // Fence tracking: interior lines never start headers.
    if let Some(open) = fence {
      if trimmed.starts_with(open) {
        fence = None;
      }
      current.body.push_str(line);
      current.body.push('\n');
      current.end_line = line_no;
      i += 1;
      continue;
    }
    if trimmed.starts_with("```") {
      fence = Some("```");
      current.body.push_str(line);
      current.body.push('\n');
      current.end_line = line_no;
      i += 1;
      continue;
    }
    if trimmed.starts_with("~~~") {
      fence = Some("~~~");
      current.body.push_str(line);
      current.body.push('\n');
      current.end_line = line_no;
      i += 1;
      continue;
    }

    let header = parse_atx_header(line).or_else(|| {
      // Setext: a non-empty text line underlined by === or ---.
      lines
        .get(i + 1)
        .and_then(|next| parse_setext_underline(next))
        .filter(|_| !line.trim().is_empty())
        .map(|level| (level, line.trim().to_string()))
    });

    if let Some((level, title)) = header {
      sections.push(current);

      while stack.last().is_some_and(|(l, _)| *l >= level) {
        stack.pop();
      }
      stack.push((level, title.clone()));
      let path: Vec<String> = stack.iter().map(|(_, t)| t.clone()).collect();

      let consumed = if parse_atx_header(line).is_some() { 1 } else { 2 };
      current = Section {
        level,
        title: Some(title),
        path,
        start_line: line_no,
        end_line: line_no + (consumed as u32) - 1,
        body: String::new(),
      };
      i += consumed;
      continue;
    }

    current.body.push_str(line);
    current.body.push('\n');
    current.end_line = line_no;
    i += 1;
  }

  sections.push(current);
  sections
}

fn parse_atx_header(line: &str) -> Option<(usize, String)> {
  let trimmed = line.trim_start();
  let hashes = trimmed.chars().take_while(|&c| c == '#').count();
  if hashes == 0 || hashes > 6 {
    return None;
  }
  let rest = &trimmed[hashes..];
  if !rest.starts_with(' ') && !rest.is_empty() {
    return None;
  }
  let title = rest.trim().trim_end_matches('#').trim().to_string();
  if title.is_empty() {
    return None;
  }
  Some((hashes, title))
}

fn parse_setext_underline(line: &str) -> Option<usize> {
  let trimmed = line.trim();
  if trimmed.len() < 2 {
    return None;
  }
  if trimmed.chars().all(|c| c == '=') {
    Some(1)
  } else if trimmed.chars().all(|c| c == '-') {
    Some(2)
  } else {
    None
  }
}

fn breadcrumb(section: &Section) -> Option<String> {
  if section.path.is_empty() {
    None
  } else {
    Some(section.path.join(" > "))
  }
}

fn emit_section(section: &Section, chunks: &mut Vec<RawChunk>) {
  let crumb = breadcrumb(section);
  let body = section.body.trim_end_matches('\n');

  let rendered = |text: &str, continued: bool| -> String {
    match (&crumb, continued) {
      (Some(c), false) => format!("[{c}]\n{text}"),
      (Some(c), true) => format!("[{c}] (continued)\n{text}"),
      (None, _) => text.to_string(),
    }
  };

  let metadata = |part: Option<(u32, u32)>| -> ChunkMetadata {
    ChunkMetadata {
      kind: Some(ChunkKind::Section),
      name: section.title.clone(),
      language: Some(Language::Markdown),
      header_path: crumb.clone(),
      part: part.map(|(p, _)| p),
      total_parts: part.map(|(_, t)| t),
      ..Default::default()
    }
  };

  if body.chars().count() <= MAX_SECTION_CHARS {
    chunks.push(RawChunk {
      text: rendered(body, false),
      start_line: section.start_line,
      end_line: section.end_line,
      metadata: Some(metadata(None)),
    });
    return;
  }

  // Sub-chunk on paragraph boundaries with the prose overlap preset.
  let config = character::SplitterConfig::prose();
  let parts = character::split(body, &config);
  let total = parts.len() as u32;
  // Body line numbers are relative to the section body; shift them to the
  // section's position in the file. The header line(s) precede the body.
  let body_first_line = section.start_line + if section.title.is_some() { 1 } else { 0 };

  for (idx, part) in parts.into_iter().enumerate() {
    let part_no = idx as u32 + 1;
    chunks.push(RawChunk {
      text: rendered(&part.text, idx > 0),
      start_line: body_first_line + part.start_line - 1,
      end_line: body_first_line + part.end_line - 1,
      metadata: Some(metadata(Some((part_no, total)))),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_single_section() {
    let chunks = split("# Title\n\nSome content here.\n");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.starts_with("[Title]\n"));
    assert!(chunks[0].text.contains("Some content here."));
    let meta = chunks[0].metadata.as_ref().unwrap();
    assert_eq!(meta.kind, Some(ChunkKind::Section));
    assert_eq!(meta.name.as_deref(), Some("Title"));
  }

  #[test]
  fn test_breadcrumbs_nested() {
    let doc = "# Guide\n\nintro\n\n## Setup\n\ninstall steps\n\n## Usage\n\nrun it\n";
    let chunks = split(doc);
    assert_eq!(chunks.len(), 3);
    assert!(chunks[1].text.starts_with("[Guide > Setup]\n"));
    assert!(chunks[2].text.starts_with("[Guide > Usage]\n"));
  }

  #[test]
  fn test_preamble_without_header() {
    let doc = "just prose, no headers at all\nsecond line\n";
    let chunks = split(doc);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "just prose, no headers at all\nsecond line");
    assert!(chunks[0].metadata.as_ref().unwrap().header_path.is_none());
  }

  #[test]
  fn test_frontmatter_stripped_offsets_kept() {
    let doc = "---\ntitle: x\ndate: y\n---\n# Real\n\ncontent\n";
    let chunks = split(doc);
    assert_eq!(chunks.len(), 1);
    // Header is on line 5 of the original file.
    assert_eq!(chunks[0].start_line, 5);
    assert!(!chunks[0].text.contains("title: x"));
  }

  #[test]
  fn test_fenced_code_hides_headers() {
    let doc = "# Top\n\n```\n# not a header\n## neither\n```\n\ntail\n";
    let chunks = split(doc);
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("# not a header"));
  }

  #[test]
  fn test_setext_headers() {
    let doc = "Title One\n=========\n\nbody a\n\nSub Title\n---------\n\nbody b\n";
    let chunks = split(doc);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].text.starts_with("[Title One]\n"));
    assert!(chunks[1].text.starts_with("[Title One > Sub Title]\n"));
  }

  #[test]
  fn test_sibling_resets_breadcrumb() {
    let doc = "# A\n\n## A1\n\nx\n\n# B\n\ny\n";
    let chunks = split(doc);
    let last = chunks.last().unwrap();
    assert!(last.text.starts_with("[B]\n"), "got: {}", last.text);
  }

  #[test]
  fn test_oversized_section_subchunks_with_continued() {
    let mut doc = String::from("# Big\n\n");
    for i in 0..600 {
      doc.push_str(&format!("paragraph number {i} with a reasonable amount of text in it.\n\n"));
    }
    let chunks = split(&doc);
    assert!(chunks.len() > 1);
    assert!(chunks[0].text.starts_with("[Big]\n"));
    assert!(chunks[1].text.starts_with("[Big] (continued)\n"));

    let meta0 = chunks[0].metadata.as_ref().unwrap();
    assert_eq!(meta0.part, Some(1));
    assert_eq!(meta0.total_parts, Some(chunks.len() as u32));
  }

  #[test]
  fn test_determinism() {
    let doc = "# A\n\ntext\n\n## B\n\nmore\n";
    assert_eq!(format!("{:?}", split(doc)), format!("{:?}", split(doc)));
  }
}
