//! Project root detection.
//!
//! Walks parent directories from a starting path looking for a project
//! marker. `.git` may be a plain file (worktree link) or a directory.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Ordered list of markers; the first one found wins.
const PROJECT_MARKERS: &[&str] = &[".git", "package.json", "pyproject.toml", "Cargo.toml", "go.mod"];

#[derive(Error, Debug)]
pub enum ProjectError {
  #[error("No project detected above {0}")]
  ProjectNotDetected(PathBuf),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Find the project root containing `start` (or `start` itself).
///
/// Starting from `start` (resolved to a directory if it is a file), each
/// ancestor is checked for the markers in order. The nearest directory with
/// any marker wins.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ProjectError> {
  let start_dir = if start.is_file() {
    start.parent().unwrap_or(start)
  } else {
    start
  };

  let mut current = Some(start_dir);
  while let Some(dir) = current {
    for marker in PROJECT_MARKERS {
      // .git may be a file (worktree) or a directory; exists() covers both.
      if dir.join(marker).exists() {
        debug!(root = %dir.display(), marker = marker, "Project root detected");
        return Ok(dir.to_path_buf());
      }
    }
    current = dir.parent();
  }

  Err(ProjectError::ProjectNotDetected(start.to_path_buf()))
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn test_detects_git_dir() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".git")).unwrap();
    std::fs::create_dir_all(temp.path().join("src/nested")).unwrap();

    let root = find_project_root(&temp.path().join("src/nested")).unwrap();
    assert_eq!(root, temp.path());
  }

  #[test]
  fn test_detects_git_worktree_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".git"), "gitdir: /elsewhere/.git/worktrees/x").unwrap();

    let root = find_project_root(temp.path()).unwrap();
    assert_eq!(root, temp.path());
  }

  #[test]
  fn test_nearest_marker_wins() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Cargo.toml"), "[workspace]").unwrap();
    let inner = temp.path().join("web");
    std::fs::create_dir_all(&inner).unwrap();
    std::fs::write(inner.join("package.json"), "{}").unwrap();

    let root = find_project_root(&inner).unwrap();
    assert_eq!(root, inner);
  }

  #[test]
  fn test_starting_from_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("go.mod"), "module x").unwrap();
    let file = temp.path().join("main.go");
    std::fs::write(&file, "package main").unwrap();

    let root = find_project_root(&file).unwrap();
    assert_eq!(root, temp.path());
  }
}
