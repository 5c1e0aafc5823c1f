//! Per-file symbol summaries.
//!
//! Walks the AST once and produces a structured overview of a file:
//! declared symbols, imports, exported names, and a cyclomatic-style
//! complexity estimate. Used for stats and query-time context rather than
//! chunk storage.

use tree_sitter::{Node, Parser};

use crate::domain::{ChunkKind, Language};

/// A declared symbol with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
  pub name: String,
  pub kind: ChunkKind,
  /// 1-based line of the declaration.
  pub line: u32,
}

/// Structured summary of one file.
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
  pub symbols: Vec<SymbolInfo>,
  pub imports: Vec<String>,
  pub exports: Vec<String>,
  /// Decision-point count + 1; a rough cyclomatic complexity for the file.
  pub complexity: u32,
}

/// Node kinds that add a decision point.
const DECISION_KINDS: &[&str] = &[
  "if_statement",
  "if_expression",
  "elif_clause",
  "else_if_clause",
  "for_statement",
  "for_expression",
  "for_in_statement",
  "while_statement",
  "while_expression",
  "loop_expression",
  "match_expression",
  "match_statement",
  "match_arm",
  "case_clause",
  "switch_case",
  "catch_clause",
  "except_clause",
  "conditional_expression",
  "ternary_expression",
];

/// Extract a file summary, or `None` when no grammar covers the language.
pub fn extract_summary(text: &str, language: Language) -> Option<FileSummary> {
  let grammar = super::ast::grammar(language)?;

  let mut parser = Parser::new();
  parser.set_language(&grammar).ok()?;
  let tree = parser.parse(text, None)?;

  let mut summary = FileSummary {
    complexity: 1,
    ..Default::default()
  };
  walk(tree.root_node(), text, language, &mut summary);

  summary.exports = derive_exports(&summary, language);
  Some(summary)
}

fn walk(node: Node<'_>, text: &str, language: Language, summary: &mut FileSummary) {
  let kind = node.kind();

  if DECISION_KINDS.contains(&kind) {
    summary.complexity += 1;
  }

  if is_import_kind(kind, language) {
    if let Ok(t) = node.utf8_text(text.as_bytes()) {
      summary.imports.push(t.lines().next().unwrap_or(t).trim().to_string());
    }
  }

  if let Some(symbol_kind) = symbol_kind(kind, language)
    && let Some(name) = named_child_text(node, text)
  {
    summary.symbols.push(SymbolInfo {
      name,
      kind: symbol_kind,
      line: node.start_position().row as u32 + 1,
    });
  }

  let mut cursor = node.walk();
  for child in node.children(&mut cursor) {
    walk(child, text, language, summary);
  }
}

fn is_import_kind(kind: &str, language: Language) -> bool {
  match language {
    Language::Rust => kind == "use_declaration",
    Language::Python => kind == "import_statement" || kind == "import_from_statement",
    Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => kind == "import_statement",
    Language::Go => kind == "import_spec",
    Language::Java => kind == "import_declaration",
    _ => false,
  }
}

fn symbol_kind(kind: &str, language: Language) -> Option<ChunkKind> {
  match language {
    Language::Rust => match kind {
      "function_item" => Some(ChunkKind::Function),
      "struct_item" => Some(ChunkKind::Struct),
      "enum_item" => Some(ChunkKind::Enum),
      "trait_item" => Some(ChunkKind::Trait),
      "type_item" => Some(ChunkKind::Type),
      _ => None,
    },
    Language::Python => match kind {
      "function_definition" => Some(ChunkKind::Function),
      "class_definition" => Some(ChunkKind::Class),
      _ => None,
    },
    Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => match kind {
      "function_declaration" => Some(ChunkKind::Function),
      "class_declaration" => Some(ChunkKind::Class),
      "interface_declaration" => Some(ChunkKind::Interface),
      "type_alias_declaration" => Some(ChunkKind::Type),
      "enum_declaration" => Some(ChunkKind::Enum),
      "method_definition" => Some(ChunkKind::Method),
      _ => None,
    },
    Language::Go => match kind {
      "function_declaration" => Some(ChunkKind::Function),
      "method_declaration" => Some(ChunkKind::Method),
      "type_spec" => Some(ChunkKind::Type),
      _ => None,
    },
    Language::Java => match kind {
      "class_declaration" => Some(ChunkKind::Class),
      "interface_declaration" => Some(ChunkKind::Interface),
      "enum_declaration" => Some(ChunkKind::Enum),
      "method_declaration" => Some(ChunkKind::Method),
      _ => None,
    },
    _ => None,
  }
}

fn named_child_text(node: Node<'_>, text: &str) -> Option<String> {
  let name = node.child_by_field_name("name")?;
  name.utf8_text(text.as_bytes()).ok().map(|s| s.to_string())
}

/// Exported names, by each language's convention.
fn derive_exports(summary: &FileSummary, language: Language) -> Vec<String> {
  match language {
    // Go: exported identifiers are capitalized.
    Language::Go => summary
      .symbols
      .iter()
      .filter(|s| s.name.chars().next().is_some_and(|c| c.is_uppercase()))
      .map(|s| s.name.clone())
      .collect(),
    // Python: underscore prefix means private by convention.
    Language::Python => summary
      .symbols
      .iter()
      .filter(|s| !s.name.starts_with('_'))
      .map(|s| s.name.clone())
      .collect(),
    // Other languages: resolved from chunk metadata (export/pub) at index
    // time; the file summary lists everything.
    _ => summary.symbols.iter().map(|s| s.name.clone()).collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rust_summary() {
    let source = r#"use std::collections::HashMap;
use std::io::Read;

pub fn process(data: &str) -> HashMap<String, u32> {
    let mut out = HashMap::new();
    for line in data.lines() {
        if line.is_empty() {
            continue;
        }
        out.insert(line.to_string(), 1);
    }
    out
}

struct Counter {
    total: u32,
}
"#;
    let summary = extract_summary(source, Language::Rust).unwrap();

    assert_eq!(summary.imports.len(), 2);
    assert!(summary.imports[0].contains("HashMap"));

    let names: Vec<&str> = summary.symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"process"));
    assert!(names.contains(&"Counter"));

    // 1 base + for + if
    assert!(summary.complexity >= 3, "complexity was {}", summary.complexity);
  }

  #[test]
  fn test_python_exports_skip_private() {
    let source = "def public_fn():\n    pass\n\ndef _private_fn():\n    pass\n";
    let summary = extract_summary(source, Language::Python).unwrap();
    assert!(summary.exports.contains(&"public_fn".to_string()));
    assert!(!summary.exports.contains(&"_private_fn".to_string()));
  }

  #[test]
  fn test_go_exports_capitalized() {
    let source = "package x\n\nfunc Public() {}\n\nfunc private() {}\n";
    let summary = extract_summary(source, Language::Go).unwrap();
    assert_eq!(summary.exports, vec!["Public"]);
  }

  #[test]
  fn test_unsupported_language() {
    assert!(extract_summary("SELECT 1;", Language::Sql).is_none());
  }
}
