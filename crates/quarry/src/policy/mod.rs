//! Indexing policy: the per-file predicate deciding what gets indexed.
//!
//! Decision order (first match wins):
//! 1. hardcoded deny list (dependencies, VCS, build output, secrets, logs,
//!    lock files, IDE state, coverage)
//! 2. user exclude globs
//! 3. gitignore (nested, with negation, when `respect_gitignore`)
//! 4. binary detection (extension list, then content sniff)
//! 5. size limit
//! 6. user include globs (`**/*` means everything)
//!
//! Paths are sanitized (NFC + invisible-character strip) before matching,
//! and matching is case-insensitive on platforms whose filesystems are.

pub mod sanitize;

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;
use tracing::{debug, warn};

use self::sanitize::sanitize_path;
use crate::config::ProjectConfig;

/// Why a path was denied (or that it was allowed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCategory {
  Hardcoded,
  UserExclude,
  Gitignore,
  Binary,
  Size,
  IncludeMismatch,
  Allow,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
  pub allow: bool,
  pub category: PolicyCategory,
}

impl PolicyDecision {
  fn deny(category: PolicyCategory) -> Self {
    Self { allow: false, category }
  }

  fn allow() -> Self {
    Self {
      allow: true,
      category: PolicyCategory::Allow,
    }
  }
}

#[derive(Error, Debug)]
pub enum PolicyError {
  #[error("Invalid glob pattern '{pattern}': {source}")]
  InvalidGlob {
    pattern: String,
    #[source]
    source: globset::Error,
  },
  #[error("Failed to build gitignore: {0}")]
  Gitignore(#[from] ignore::Error),
  #[error("Config error: {0}")]
  Config(#[from] crate::config::ConfigError),
}

/// Directory names that are never indexed regardless of user config.
const DENY_DIRS: &[&str] = &[
  // dependencies
  "node_modules",
  "vendor",
  "bower_components",
  ".venv",
  "venv",
  "__pycache__",
  ".tox",
  // VCS
  ".git",
  ".svn",
  ".hg",
  // build artifacts
  "dist",
  "build",
  "target",
  "out",
  ".next",
  ".nuxt",
  // IDE state
  ".idea",
  ".vscode",
  // our own index state
  ".quarry",
  // coverage
  "coverage",
  ".nyc_output",
];

/// File name patterns that are never indexed (secrets, logs, locks).
const DENY_FILE_GLOBS: &[&str] = &[
  ".env",
  ".env.*",
  "*.pem",
  "*.key",
  "*.p12",
  "*.pfx",
  "*.log",
  "package-lock.json",
  "yarn.lock",
  "pnpm-lock.yaml",
  "Cargo.lock",
  "poetry.lock",
  "composer.lock",
  "Gemfile.lock",
  ".DS_Store",
];

/// Extensions always treated as binary without sniffing.
const BINARY_EXTENSIONS: &[&str] = &[
  "png", "jpg", "jpeg", "gif", "bmp", "webp", "ico", "icns", "tiff", "pdf", "zip", "tar", "gz", "bz2", "xz", "zst",
  "7z", "rar", "jar", "war", "exe", "dll", "so", "dylib", "a", "o", "rlib", "class", "pyc", "pyo", "wasm", "woff",
  "woff2", "ttf", "otf", "eot", "mp3", "mp4", "wav", "ogg", "avi", "mov", "mkv", "webm", "flac", "db", "sqlite",
  "sqlite3", "bin", "dat", "parquet", "lance",
];

/// How much of an unknown-extension file is sniffed for binary content.
const SNIFF_BYTES: usize = 8 * 1024;

/// Fraction of non-printable bytes above which content is called binary.
const NON_PRINTABLE_THRESHOLD: f64 = 0.30;

/// The per-file indexing predicate.
pub struct IndexingPolicy {
  root: PathBuf,
  deny_files: GlobSet,
  user_include: GlobSet,
  user_exclude: GlobSet,
  include_is_default: bool,
  gitignore: Option<Gitignore>,
  respect_gitignore: bool,
  max_file_size: u64,
  case_insensitive: bool,
}

impl IndexingPolicy {
  pub fn new(root: &Path, config: &ProjectConfig) -> Result<Self, PolicyError> {
    // Case sensitivity follows the platform's filesystem convention.
    let case_insensitive = cfg!(any(windows, target_os = "macos"));

    let deny_files = build_globset(DENY_FILE_GLOBS.iter().copied(), case_insensitive)?;
    let user_exclude = build_globset(config.exclude.iter().map(|s| s.as_str()), case_insensitive)?;
    let include_is_default = config.include.is_empty() || config.include.iter().any(|g| g == "**/*");
    let user_include = build_globset(config.include.iter().map(|s| s.as_str()), case_insensitive)?;

    let gitignore = if config.respect_gitignore {
      Some(load_gitignore(root)?)
    } else {
      None
    };

    Ok(Self {
      root: root.to_path_buf(),
      deny_files,
      user_include,
      user_exclude,
      include_is_default,
      gitignore,
      respect_gitignore: config.respect_gitignore,
      max_file_size: config.max_file_size_bytes()?,
      case_insensitive,
    })
  }

  /// Re-read gitignore state from disk (after a `.gitignore` edit).
  pub fn reload_gitignore(&mut self) -> Result<(), PolicyError> {
    if self.respect_gitignore {
      self.gitignore = Some(load_gitignore(&self.root)?);
    }
    Ok(())
  }

  /// Decide whether a file should be indexed.
  ///
  /// `rel_path` is project-relative; `abs_path` is used for the binary
  /// sniff and size check and may not exist (deletions), in which case
  /// those checks pass.
  pub fn should_index(&self, rel_path: &str, abs_path: &Path) -> PolicyDecision {
    let clean = sanitize_path(rel_path);
    let match_path = if self.case_insensitive {
      clean.to_lowercase()
    } else {
      clean.clone()
    };

    // 1. Hardcoded denies
    if self.is_hardcoded_denied(&match_path) {
      return PolicyDecision::deny(PolicyCategory::Hardcoded);
    }

    // 2. User excludes
    if self.user_exclude.is_match(&clean) {
      return PolicyDecision::deny(PolicyCategory::UserExclude);
    }

    // 3. Gitignore
    if let Some(ref gitignore) = self.gitignore
      && gitignore.matched_path_or_any_parents(Path::new(&clean), false).is_ignore()
    {
      return PolicyDecision::deny(PolicyCategory::Gitignore);
    }

    // 4. Binary detection
    if self.is_binary(&match_path, abs_path) {
      return PolicyDecision::deny(PolicyCategory::Binary);
    }

    // 5. Size limit
    if let Ok(meta) = std::fs::metadata(abs_path)
      && meta.len() > self.max_file_size
    {
      return PolicyDecision::deny(PolicyCategory::Size);
    }

    // 6. User includes
    if !self.include_is_default && !self.user_include.is_match(&clean) {
      return PolicyDecision::deny(PolicyCategory::IncludeMismatch);
    }

    PolicyDecision::allow()
  }

  fn is_hardcoded_denied(&self, match_path: &str) -> bool {
    for segment in match_path.split('/') {
      if DENY_DIRS.contains(&segment) {
        return true;
      }
    }
    // File patterns are name-based; match against the final component so
    // `sub/dir/.env` is caught as well as a root-level `.env`.
    let file_name = match_path.rsplit('/').next().unwrap_or(match_path);
    self.deny_files.is_match(file_name)
  }

  fn is_binary(&self, match_path: &str, abs_path: &Path) -> bool {
    let file_name = match_path.rsplit('/').next().unwrap_or(match_path);
    if let Some(ext) = file_name.rsplit('.').next()
      && file_name.contains('.')
      && BINARY_EXTENSIONS.contains(&ext)
    {
      return true;
    }

    // Known text-ish extension: trust it, skip the sniff.
    if file_name.contains('.')
      && let Some(ext) = file_name.rsplit('.').next()
      && crate::domain::Language::from_extension(ext).is_some()
    {
      return false;
    }

    sniff_binary(abs_path)
  }
}

/// Cheap segment-only check against the hardcoded deny list, usable
/// without a full policy (the watcher filters event floods with it).
pub fn hardcoded_denied(path: &str) -> bool {
  sanitize_path(path).split('/').any(|segment| DENY_DIRS.contains(&segment))
}

/// Content sniff: NUL byte or too many non-printable bytes in the head.
fn sniff_binary(path: &Path) -> bool {
  use std::io::Read;

  let Ok(mut file) = std::fs::File::open(path) else {
    return false;
  };
  let mut buf = vec![0u8; SNIFF_BYTES];
  let Ok(n) = file.read(&mut buf) else {
    return false;
  };
  if n == 0 {
    return false;
  }
  let head = &buf[..n];

  if head.contains(&0) {
    return true;
  }

  let non_printable = head
    .iter()
    .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
    .count();
  (non_printable as f64 / n as f64) > NON_PRINTABLE_THRESHOLD
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>, case_insensitive: bool) -> Result<GlobSet, PolicyError> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let glob: Glob = GlobBuilder::new(pattern)
      .case_insensitive(case_insensitive)
      .literal_separator(false)
      .build()
      .map_err(|source| PolicyError::InvalidGlob {
        pattern: pattern.to_string(),
        source,
      })?;
    builder.add(glob);
  }
  builder.build().map_err(|source| PolicyError::InvalidGlob {
    pattern: "<set>".to_string(),
    source,
  })
}

/// Build a gitignore matcher from the root and nested `.gitignore` files.
///
/// Traversal skips hardcoded-denied directories so a gitignore buried in
/// `node_modules` cannot affect (or slow down) matching.
fn load_gitignore(root: &Path) -> Result<Gitignore, PolicyError> {
  let mut builder = GitignoreBuilder::new(root);

  let walker = walkdir::WalkDir::new(root)
    .follow_links(false)
    .into_iter()
    .filter_entry(|entry| {
      let name = entry.file_name().to_string_lossy();
      !(entry.file_type().is_dir() && DENY_DIRS.contains(&name.as_ref()))
    });

  let mut found = 0usize;
  for entry in walker.filter_map(|e| e.ok()) {
    if entry.file_type().is_file() && entry.file_name() == ".gitignore" {
      if let Some(err) = builder.add(entry.path()) {
        warn!(path = %entry.path().display(), error = %err, "Error parsing .gitignore, continuing with partial rules");
      }
      found += 1;
    }
  }

  debug!(root = %root.display(), gitignore_files = found, "Gitignore matcher built");
  Ok(builder.build()?)
}
