//! Code-aware splitter: packs boundary-to-boundary regions into chunks.
//!
//! A per-language catalogue of line prefixes marks semantic boundary starts
//! (functions, classes, impls, resources, sections). Regions between
//! boundaries are greedily packed under the chunk budget. When a file is
//! over budget and no boundaries are found at all, the splitter signals
//! fallback so the dispatcher can use the character splitter instead.

use super::RawChunk;
use crate::domain::Language;

/// Character budget per chunk; matches the character splitter's code preset.
const CHUNK_SIZE: usize = 4000;

/// Languages the boundary catalogue covers.
pub fn supports_language(language: Language) -> bool {
  matches!(
    language,
    Language::Rust
      | Language::Python
      | Language::TypeScript
      | Language::JavaScript
      | Language::Tsx
      | Language::Jsx
      | Language::Go
      | Language::Java
      | Language::Kotlin
      | Language::CSharp
      | Language::Cpp
      | Language::C
      | Language::Ruby
      | Language::Php
      | Language::Swift
      | Language::Shell
      | Language::Sql
      | Language::Terraform
      | Language::Css
  )
}

/// Split a file on semantic boundaries.
///
/// Returns `None` (the fallback signal) when the file exceeds the budget
/// and no boundaries were detected.
pub fn split(text: &str, language: Language) -> Option<Vec<RawChunk>> {
  let lines: Vec<&str> = text.lines().collect();
  let total_lines = lines.len();

  if text.chars().count() <= CHUNK_SIZE {
    if text.trim().is_empty() {
      return Some(Vec::new());
    }
    return Some(vec![RawChunk {
      text: text.to_string(),
      start_line: 1,
      end_line: (total_lines.max(1)) as u32,
      metadata: None,
    }]);
  }

  let boundaries = find_boundaries(&lines, language);
  if boundaries.is_empty() {
    return None;
  }

  // Region edges: file start, each boundary line, file end.
  let mut edges: Vec<usize> = Vec::with_capacity(boundaries.len() + 2);
  edges.push(0);
  for &b in &boundaries {
    if b != 0 {
      edges.push(b);
    }
  }
  edges.push(total_lines);
  edges.dedup();

  let mut chunks = Vec::new();
  let mut region_start = edges[0];
  let mut budget = 0usize;

  for window in edges.windows(2) {
    let (from, to) = (window[0], window[1]);
    let region_chars: usize = lines[from..to].iter().map(|l| l.chars().count() + 1).sum();

    if budget > 0 && budget + region_chars > CHUNK_SIZE {
      push_region(&mut chunks, &lines, region_start, from);
      region_start = from;
      budget = 0;
    }
    budget += region_chars;
  }
  push_region(&mut chunks, &lines, region_start, total_lines);

  Some(chunks)
}

fn push_region(chunks: &mut Vec<RawChunk>, lines: &[&str], from: usize, to: usize) {
  if from >= to {
    return;
  }
  let text = lines[from..to].join("\n");
  if text.trim().is_empty() {
    return;
  }
  chunks.push(RawChunk {
    text,
    start_line: (from + 1) as u32,
    end_line: to as u32,
    metadata: None,
  });
}

/// Line indices (0-based) that start a semantic region.
fn find_boundaries(lines: &[&str], language: Language) -> Vec<usize> {
  let mut boundaries = Vec::new();

  for (i, line) in lines.iter().enumerate() {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
      continue;
    }
    // Only consider top-level-ish lines: nested definitions stay with
    // their parent region.
    let indent = line.len() - trimmed.len();
    if indent > 4 {
      continue;
    }

    if is_boundary_line(trimmed, language) {
      boundaries.push(i);
    }
  }

  boundaries
}

fn is_boundary_line(trimmed: &str, language: Language) -> bool {
  let starts = |prefixes: &[&str]| prefixes.iter().any(|p| trimmed.starts_with(p));

  match language {
    Language::Rust => starts(&[
      "pub fn ",
      "fn ",
      "pub async fn ",
      "async fn ",
      "pub struct ",
      "struct ",
      "pub enum ",
      "enum ",
      "impl ",
      "impl<",
      "pub trait ",
      "trait ",
      "pub mod ",
      "mod ",
      "pub type ",
      "macro_rules!",
    ]),
    Language::Python => starts(&["def ", "async def ", "class ", "@"]),
    Language::TypeScript | Language::JavaScript | Language::Tsx | Language::Jsx => {
      starts(&[
        "function ",
        "async function ",
        "export function ",
        "export async function ",
        "export default function ",
        "class ",
        "export class ",
        "export default class ",
        "interface ",
        "export interface ",
        "type ",
        "export type ",
        "enum ",
        "export enum ",
        "namespace ",
        "export namespace ",
      ]) || (trimmed.starts_with("const ") || trimmed.starts_with("export const "))
        && (trimmed.contains(" = (") || trimmed.contains(" = async (") || trimmed.contains(" => "))
    }
    Language::Go => {
      starts(&["func "]) || (trimmed.starts_with("type ") && (trimmed.contains("struct") || trimmed.contains("interface")))
    }
    Language::Java | Language::CSharp | Language::Kotlin => starts(&[
      "public class ",
      "class ",
      "public interface ",
      "interface ",
      "public enum ",
      "enum ",
      "public ",
      "private ",
      "protected ",
      "fun ",
      "object ",
    ]),
    Language::Cpp | Language::C => {
      starts(&["struct ", "class ", "enum ", "union ", "namespace ", "template", "#define "])
        || (trimmed.contains('(') && !trimmed.starts_with("//") && trimmed.ends_with('{'))
    }
    Language::Ruby => starts(&["def ", "class ", "module "]),
    Language::Php => starts(&["function ", "class ", "interface ", "trait ", "public function ", "private function "]),
    Language::Swift => starts(&["func ", "class ", "struct ", "enum ", "protocol ", "extension "]),
    Language::Shell => {
      trimmed.starts_with("function ") || (trimmed.contains("()") && trimmed.ends_with('{'))
    }
    Language::Sql => {
      let lower = trimmed.to_lowercase();
      lower.starts_with("create ") || lower.starts_with("alter ") || lower.starts_with("insert ")
    }
    Language::Terraform => starts(&["resource ", "module ", "data ", "variable ", "output ", "provider ", "locals "]),
    Language::Css => trimmed.ends_with('{') && !trimmed.starts_with('@') || trimmed.starts_with("@media"),
    _ => false,
  }
}
