use serde::{Deserialize, Serialize};

/// Languages the chunking pipeline knows about.
///
/// Membership here does not imply AST support; it only means the code-aware
/// splitter has boundary patterns or the character splitter should use code
/// presets. AST support is a strict subset (see `chunker::ast`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  TypeScript,
  JavaScript,
  Tsx,
  Jsx,
  Rust,
  Python,
  Go,
  Java,
  Kotlin,
  Scala,
  CSharp,
  Cpp,
  C,
  Swift,
  Ruby,
  Php,
  Lua,
  Elixir,
  Haskell,
  Zig,
  Html,
  Css,
  Json,
  Yaml,
  Toml,
  Xml,
  Markdown,
  Shell,
  Sql,
  Dockerfile,
  Terraform,
  Proto,
}

impl Language {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "ts" | "mts" | "cts" => Some(Language::TypeScript),
      "js" | "mjs" | "cjs" => Some(Language::JavaScript),
      "tsx" => Some(Language::Tsx),
      "jsx" => Some(Language::Jsx),
      "rs" => Some(Language::Rust),
      "py" | "pyi" | "pyw" => Some(Language::Python),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "kt" | "kts" => Some(Language::Kotlin),
      "scala" | "sc" => Some(Language::Scala),
      "cs" => Some(Language::CSharp),
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Some(Language::Cpp),
      "c" | "h" => Some(Language::C),
      "swift" => Some(Language::Swift),
      "rb" | "rake" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "lua" => Some(Language::Lua),
      "ex" | "exs" => Some(Language::Elixir),
      "hs" => Some(Language::Haskell),
      "zig" => Some(Language::Zig),
      "html" | "htm" => Some(Language::Html),
      "css" | "scss" | "less" => Some(Language::Css),
      "json" | "jsonc" => Some(Language::Json),
      "yaml" | "yml" => Some(Language::Yaml),
      "toml" => Some(Language::Toml),
      "xml" | "xsd" | "xsl" => Some(Language::Xml),
      "md" | "markdown" => Some(Language::Markdown),
      "sh" | "bash" | "zsh" | "fish" => Some(Language::Shell),
      "sql" => Some(Language::Sql),
      "dockerfile" => Some(Language::Dockerfile),
      "tf" | "hcl" => Some(Language::Terraform),
      "proto" => Some(Language::Proto),
      _ => None,
    }
  }

  pub fn from_path(path: &str) -> Option<Self> {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.eq_ignore_ascii_case("dockerfile") {
      return Some(Language::Dockerfile);
    }
    let ext = name.rsplit('.').next()?;
    Self::from_extension(ext)
  }

  /// Lowercase name as stored in chunk metadata and the vector store.
  pub fn as_str(&self) -> &'static str {
    match self {
      Language::TypeScript => "typescript",
      Language::JavaScript => "javascript",
      Language::Tsx => "tsx",
      Language::Jsx => "jsx",
      Language::Rust => "rust",
      Language::Python => "python",
      Language::Go => "go",
      Language::Java => "java",
      Language::Kotlin => "kotlin",
      Language::Scala => "scala",
      Language::CSharp => "csharp",
      Language::Cpp => "cpp",
      Language::C => "c",
      Language::Swift => "swift",
      Language::Ruby => "ruby",
      Language::Php => "php",
      Language::Lua => "lua",
      Language::Elixir => "elixir",
      Language::Haskell => "haskell",
      Language::Zig => "zig",
      Language::Html => "html",
      Language::Css => "css",
      Language::Json => "json",
      Language::Yaml => "yaml",
      Language::Toml => "toml",
      Language::Xml => "xml",
      Language::Markdown => "markdown",
      Language::Shell => "shell",
      Language::Sql => "sql",
      Language::Dockerfile => "dockerfile",
      Language::Terraform => "terraform",
      Language::Proto => "proto",
    }
  }

  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "typescript" => Some(Language::TypeScript),
      "javascript" => Some(Language::JavaScript),
      "tsx" => Some(Language::Tsx),
      "jsx" => Some(Language::Jsx),
      "rust" => Some(Language::Rust),
      "python" => Some(Language::Python),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "kotlin" => Some(Language::Kotlin),
      "scala" => Some(Language::Scala),
      "csharp" => Some(Language::CSharp),
      "cpp" => Some(Language::Cpp),
      "c" => Some(Language::C),
      "swift" => Some(Language::Swift),
      "ruby" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "lua" => Some(Language::Lua),
      "elixir" => Some(Language::Elixir),
      "haskell" => Some(Language::Haskell),
      "zig" => Some(Language::Zig),
      "html" => Some(Language::Html),
      "css" => Some(Language::Css),
      "json" => Some(Language::Json),
      "yaml" => Some(Language::Yaml),
      "toml" => Some(Language::Toml),
      "xml" => Some(Language::Xml),
      "markdown" => Some(Language::Markdown),
      "shell" => Some(Language::Shell),
      "sql" => Some(Language::Sql),
      "dockerfile" => Some(Language::Dockerfile),
      "terraform" => Some(Language::Terraform),
      "proto" => Some(Language::Proto),
      _ => None,
    }
  }
}

/// File extensions routed to the docs pipeline (prose, not code).
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "text", "rst", "adoc", "asciidoc", "org"];

/// Extensions rendered by the markdown chunker specifically.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

pub fn is_doc_extension(ext: &str) -> bool {
  DOC_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

pub fn is_markdown_extension(ext: &str) -> bool {
  MARKDOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check whether a relative path is a documentation file.
pub fn is_doc_file(rel_path: &str) -> bool {
  rel_path
    .rsplit('.')
    .next()
    .is_some_and(|ext| is_doc_extension(ext) && rel_path.contains('.'))
}
