//! AST-aware chunker built on tree-sitter.
//!
//! Emits one chunk per top-level definition (functions, classes, structs,
//! impls, traits, interfaces, enums, type aliases), with structured metadata
//! pulled from the node and its leading comments. Code not covered by any
//! definition (imports, constants) is grouped into contiguous leftover
//! chunks. Oversized definitions are re-split by the character splitter,
//! keeping their metadata and gaining part markers.

use tree_sitter::{Node, Parser};

use super::{RawChunk, character};
use crate::domain::{ChunkKind, ChunkMetadata, Language};

/// Definitions larger than this are re-split by the character splitter.
const MAX_NODE_CHARS: usize = 8000;

/// Languages with a compiled-in grammar.
pub fn supports_language(language: Language) -> bool {
  grammar(language).is_some()
}

pub(crate) fn grammar(language: Language) -> Option<tree_sitter::Language> {
  match language {
    Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
    Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
    Language::JavaScript | Language::Jsx => Some(tree_sitter_javascript::LANGUAGE.into()),
    Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
    Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
    Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
    Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
    _ => None,
  }
}

/// A definition node found during the tree walk.
struct Definition<'a> {
  node: Node<'a>,
  kind: ChunkKind,
  /// Wrapping export statement, when present (js/ts).
  is_export: bool,
  /// Decorators hoisted from a wrapping decorated_definition (python).
  decorators: Vec<String>,
}

/// Chunk a file by its AST.
///
/// Returns `None` when no grammar is available, the parse fails, or no
/// definitions are found; the dispatcher then falls through to the
/// code-aware splitter.
pub fn split(text: &str, language: Language) -> Option<Vec<RawChunk>> {
  let grammar = grammar(language)?;
  let mut parser = Parser::new();
  parser.set_language(&grammar).ok()?;
  let tree = parser.parse(text, None)?;

  let lines: Vec<&str> = text.lines().collect();
  let mut definitions = Vec::new();
  collect_definitions(tree.root_node(), text, language, false, &mut definitions);

  if definitions.is_empty() {
    return None;
  }

  definitions.sort_by_key(|d| d.node.start_position().row);

  let mut chunks = Vec::new();
  let mut covered = vec![false; lines.len()];

  for def in &definitions {
    let node_start = def.node.start_position().row;
    let node_end = def.node.end_position().row.min(lines.len().saturating_sub(1));

    // Nested definitions already covered by an outer one stay with it.
    if (node_start..=node_end).all(|l| covered[l]) {
      continue;
    }

    let (docstring, doc_start) = leading_docstring(&lines, node_start, language);
    let chunk_start = doc_start.unwrap_or(node_start);

    for line in covered.iter_mut().take(node_end + 1).skip(chunk_start) {
      *line = true;
    }

    let body = lines[chunk_start..=node_end].join("\n");
    let metadata = build_metadata(def, &lines, node_start, language, docstring);
    emit(&body, chunk_start as u32 + 1, node_end as u32 + 1, metadata, &mut chunks);
  }

  // Leftover regions: imports, constants, module-level statements.
  let mut region_start: Option<usize> = None;
  for i in 0..=lines.len() {
    let in_leftover = i < lines.len() && !covered[i];
    match (region_start, in_leftover) {
      (None, true) => region_start = Some(i),
      (Some(start), false) => {
        push_leftover(&lines, start, i, language, &mut chunks);
        region_start = None;
      }
      _ => {}
    }
  }

  chunks.sort_by_key(|c| c.start_line);
  Some(chunks)
}

/// Recursively collect definition nodes, unwrapping container nodes.
fn collect_definitions<'a>(
  node: Node<'a>,
  text: &str,
  language: Language,
  inherited_export: bool,
  out: &mut Vec<Definition<'a>>,
) {
  let mut cursor = node.walk();
  for child in node.named_children(&mut cursor) {
    match child.kind() {
      // js/ts: export wraps the real declaration
      "export_statement" => {
        collect_definitions(child, text, language, true, out);
      }
      // python: decorators wrap the definition
      "decorated_definition" => {
        let mut decorators = Vec::new();
        let mut inner = child.walk();
        for part in child.named_children(&mut inner) {
          if part.kind() == "decorator" {
            if let Ok(t) = part.utf8_text(text.as_bytes()) {
              decorators.push(t.trim().to_string());
            }
          } else if let Some(kind) = definition_kind(part.kind(), part, text, language) {
            out.push(Definition {
              node: part,
              kind,
              is_export: inherited_export,
              decorators: decorators.clone(),
            });
          }
        }
      }
      // rust: walk into inline modules
      "mod_item" => {
        if let Some(body) = child.child_by_field_name("body") {
          collect_definitions(body, text, language, inherited_export, out);
        }
      }
      // ts: walk into namespaces
      "internal_module" | "module" => {
        if let Some(body) = child.child_by_field_name("body") {
          collect_definitions(body, text, language, inherited_export, out);
        }
      }
      kind => {
        if let Some(chunk_kind) = definition_kind(kind, child, text, language) {
          out.push(Definition {
            node: child,
            kind: chunk_kind,
            is_export: inherited_export,
            decorators: Vec::new(),
          });
        }
      }
    }
  }
}

/// Map a tree-sitter node kind to a chunk kind, per language.
fn definition_kind(kind: &str, node: Node<'_>, text: &str, language: Language) -> Option<ChunkKind> {
  match language {
    Language::Rust => match kind {
      "function_item" => Some(ChunkKind::Function),
      "struct_item" => Some(ChunkKind::Struct),
      "enum_item" => Some(ChunkKind::Enum),
      "trait_item" => Some(ChunkKind::Trait),
      "impl_item" => Some(ChunkKind::Impl),
      "type_item" => Some(ChunkKind::Type),
      "union_item" => Some(ChunkKind::Struct),
      _ => None,
    },
    Language::Python => match kind {
      "function_definition" => Some(ChunkKind::Function),
      "class_definition" => Some(ChunkKind::Class),
      _ => None,
    },
    Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => match kind {
      "function_declaration" | "generator_function_declaration" => Some(ChunkKind::Function),
      "class_declaration" => Some(ChunkKind::Class),
      "interface_declaration" => Some(ChunkKind::Interface),
      "type_alias_declaration" => Some(ChunkKind::Type),
      "enum_declaration" => Some(ChunkKind::Enum),
      "lexical_declaration" | "variable_declaration" => {
        // Only arrow/function-expression consts count as definitions.
        let body = node.utf8_text(text.as_bytes()).ok()?;
        if body.contains("=>") || body.contains("function") {
          Some(ChunkKind::Function)
        } else {
          None
        }
      }
      _ => None,
    },
    Language::Go => match kind {
      "function_declaration" => Some(ChunkKind::Function),
      "method_declaration" => Some(ChunkKind::Method),
      "type_declaration" => {
        let body = node.utf8_text(text.as_bytes()).ok()?;
        if body.contains("interface") {
          Some(ChunkKind::Interface)
        } else if body.contains("struct") {
          Some(ChunkKind::Struct)
        } else {
          Some(ChunkKind::Type)
        }
      }
      _ => None,
    },
    Language::Java => match kind {
      "class_declaration" => Some(ChunkKind::Class),
      "interface_declaration" => Some(ChunkKind::Interface),
      "enum_declaration" => Some(ChunkKind::Enum),
      "method_declaration" => Some(ChunkKind::Method),
      "record_declaration" => Some(ChunkKind::Class),
      _ => None,
    },
    _ => None,
  }
}

fn build_metadata(
  def: &Definition<'_>,
  lines: &[&str],
  node_start: usize,
  language: Language,
  docstring: Option<String>,
) -> ChunkMetadata {
  let first_line = lines.get(node_start).copied().unwrap_or("");
  let signature_line = first_line.trim();

  ChunkMetadata {
    kind: Some(def.kind),
    name: node_name(def.node, lines),
    parent_name: None,
    language: Some(language),
    visibility: extract_visibility(signature_line, language),
    is_export: def.is_export || signature_line.starts_with("export "),
    is_async: signature_line.contains("async fn ")
      || signature_line.starts_with("async ")
      || signature_line.contains(" async "),
    is_static: signature_line.contains("static "),
    docstring,
    decorators: def.decorators.clone(),
    header_path: None,
    part: None,
    total_parts: None,
  }
}

fn node_name(node: Node<'_>, lines: &[&str]) -> Option<String> {
  if let Some(name) = node.child_by_field_name("name") {
    let row = name.start_position().row;
    let col_start = name.start_position().column;
    let col_end = name.end_position().column;
    if name.start_position().row == name.end_position().row
      && let Some(line) = lines.get(row)
      && col_end <= line.len()
    {
      return Some(line[col_start..col_end].to_string());
    }
  }

  // lexical_declaration: name lives on the declarator.
  let mut cursor = node.walk();
  for child in node.named_children(&mut cursor) {
    if child.kind() == "variable_declarator" {
      return node_name(child, lines);
    }
    // go/rust type declarations: name on the inner spec
    if child.kind() == "type_spec" {
      return node_name(child, lines);
    }
  }

  // impl blocks have a "type" field instead of "name".
  if let Some(ty) = node.child_by_field_name("type") {
    let row = ty.start_position().row;
    if ty.start_position().row == ty.end_position().row
      && let Some(line) = lines.get(row)
      && ty.end_position().column <= line.len()
    {
      return Some(line[ty.start_position().column..ty.end_position().column].to_string());
    }
  }

  None
}

fn extract_visibility(signature: &str, language: Language) -> Option<String> {
  match language {
    Language::Rust => {
      if signature.starts_with("pub(crate)") {
        Some("pub(crate)".to_string())
      } else if signature.starts_with("pub(super)") {
        Some("pub(super)".to_string())
      } else if signature.starts_with("pub ") {
        Some("pub".to_string())
      } else {
        Some("private".to_string())
      }
    }
    Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx => {
      if signature.starts_with("export default") {
        Some("export default".to_string())
      } else if signature.starts_with("export") {
        Some("export".to_string())
      } else {
        None
      }
    }
    Language::Go => {
      let name_char = signature
        .split_whitespace()
        .nth(1)
        .and_then(|w| w.trim_start_matches('(').chars().next());
      match name_char {
        Some(c) if c.is_uppercase() => Some("public".to_string()),
        Some(_) => Some("private".to_string()),
        None => None,
      }
    }
    Language::Java => {
      if signature.starts_with("public ") {
        Some("public".to_string())
      } else if signature.starts_with("private ") {
        Some("private".to_string())
      } else if signature.starts_with("protected ") {
        Some("protected".to_string())
      } else {
        Some("package-private".to_string())
      }
    }
    Language::Python => None,
    _ => None,
  }
}

/// Scan upwards from a definition for its leading comment block.
fn leading_docstring(lines: &[&str], def_start: usize, language: Language) -> (Option<String>, Option<usize>) {
  if def_start == 0 {
    return (None, None);
  }

  let is_doc_line = |line: &str| -> bool {
    let t = line.trim_start();
    match language {
      Language::Rust => t.starts_with("///") || t.starts_with("//!") || t.starts_with("#["),
      Language::Python => t.starts_with('#') || t.starts_with('@'),
      Language::Go => t.starts_with("//"),
      Language::Java => t.starts_with("/**") || t.starts_with('*') || t.starts_with("//"),
      _ => t.starts_with("/**") || t.starts_with('*') || t.starts_with("//"),
    }
  };

  let mut first = def_start;
  while first > 0 && is_doc_line(lines[first - 1]) {
    first -= 1;
  }

  if first == def_start {
    return (None, None);
  }

  let docstring = lines[first..def_start].join("\n");
  (Some(docstring), Some(first))
}

fn emit(body: &str, start_line: u32, end_line: u32, metadata: ChunkMetadata, chunks: &mut Vec<RawChunk>) {
  if body.chars().count() <= MAX_NODE_CHARS {
    chunks.push(RawChunk {
      text: body.to_string(),
      start_line,
      end_line,
      metadata: Some(metadata),
    });
    return;
  }

  let parts = character::split(body, &character::SplitterConfig::code());
  let total = parts.len() as u32;
  for (idx, part) in parts.into_iter().enumerate() {
    let mut meta = metadata.clone();
    meta.part = Some(idx as u32 + 1);
    meta.total_parts = Some(total);
    chunks.push(RawChunk {
      text: part.text,
      start_line: start_line + part.start_line - 1,
      end_line: start_line + part.end_line - 1,
      metadata: Some(meta),
    });
  }
}

fn push_leftover(lines: &[&str], from: usize, to: usize, language: Language, chunks: &mut Vec<RawChunk>) {
  let body = lines[from..to].join("\n");
  if body.trim().is_empty() {
    return;
  }

  // Tiny import-only regions add noise, not signal.
  let meaningful = body.lines().filter(|l| !l.trim().is_empty()).count();
  let all_imports = body.lines().all(|l| {
    let t = l.trim();
    t.is_empty()
      || t.starts_with("use ")
      || t.starts_with("import ")
      || t.starts_with("from ")
      || t.starts_with("//")
      || t.starts_with('#')
  });
  if all_imports && meaningful < 3 {
    return;
  }

  chunks.push(RawChunk {
    text: body,
    start_line: from as u32 + 1,
    end_line: to as u32,
    metadata: Some(ChunkMetadata {
      kind: Some(ChunkKind::Other),
      language: Some(language),
      ..Default::default()
    }),
  });
}
