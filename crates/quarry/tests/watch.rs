//! Watcher scenarios with a real notify backend.

mod common;

use std::{sync::Arc, time::Duration};

use common::{CountingBackend, write_file};
use quarry::{
  ProjectConfig,
  config::WatchSettings,
  embedding::EmbeddingEngine,
  index::IndexManager,
  watcher::FileWatcher,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Fast watch settings so tests do not sit through production debounce.
fn fast_config() -> ProjectConfig {
  ProjectConfig {
    watch: WatchSettings {
      debounce_ms: 50,
      stability_threshold_ms: 30,
      poll_interval_ms: 10,
    },
    ..Default::default()
  }
}

async fn open_fast_manager(temp: &TempDir) -> Arc<IndexManager> {
  let backend = Arc::new(CountingBackend::new(common::TEST_DIM));
  let engine = Arc::new(EmbeddingEngine::new(backend, 8192));
  Arc::new(
    IndexManager::open(temp.path().to_path_buf(), fast_config(), engine)
      .await
      .unwrap(),
  )
}

/// Deadline used when polling for watcher effects.
const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn unlink_event_removes_file_from_index() {
  let temp = TempDir::new().unwrap();
  write_file(&temp, "README.md", "# T\n\nhello\n");

  let manager = open_fast_manager(&temp).await;
  manager.create_index(None).await.unwrap();
  assert!(manager.fingerprint_of("README.md").await.is_some());

  let cancel = CancellationToken::new();
  let watcher = FileWatcher::new(manager.clone(), cancel.clone()).unwrap();
  let (stats, handle) = watcher.spawn();

  // Give the backend a moment to arm, then delete.
  tokio::time::sleep(Duration::from_millis(200)).await;
  std::fs::remove_file(temp.path().join("README.md")).unwrap();

  let deadline = tokio::time::Instant::now() + WAIT;
  while manager.fingerprint_of("README.md").await.is_some() {
    assert!(tokio::time::Instant::now() < deadline, "fingerprint should be gone after unlink");
    tokio::time::sleep(Duration::from_millis(25)).await;
  }

  let store = manager.store().await;
  assert!(store.get_by_path("README.md").await.unwrap().is_empty());

  let (_, _, updates, errors) = stats.snapshot();
  assert!(updates >= 1, "unlink counts as an index update");
  assert_eq!(errors, 0);

  cancel.cancel();
  let _ = handle.await;
}

#[tokio::test]
async fn new_file_gets_indexed() {
  let temp = TempDir::new().unwrap();
  let manager = open_fast_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let cancel = CancellationToken::new();
  let watcher = FileWatcher::new(manager.clone(), cancel.clone()).unwrap();
  let (_stats, handle) = watcher.spawn();

  tokio::time::sleep(Duration::from_millis(200)).await;
  write_file(&temp, "src/new_file.rs", "pub fn brand_new() {}\n");

  let deadline = tokio::time::Instant::now() + WAIT;
  while manager.fingerprint_of("src/new_file.rs").await.is_none() {
    assert!(tokio::time::Instant::now() < deadline, "new file should be picked up by the watcher");
    tokio::time::sleep(Duration::from_millis(25)).await;
  }

  let store = manager.store().await;
  assert_eq!(store.get_by_path("src/new_file.rs").await.unwrap().len(), 1);

  cancel.cancel();
  let _ = handle.await;
}

#[tokio::test]
async fn unchanged_touch_is_skipped() {
  let temp = TempDir::new().unwrap();
  write_file(&temp, "stable.rs", "fn stable() {}\n");

  let manager = open_fast_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let cancel = CancellationToken::new();
  let watcher = FileWatcher::new(manager.clone(), cancel.clone()).unwrap();
  let (stats, handle) = watcher.spawn();

  tokio::time::sleep(Duration::from_millis(200)).await;
  // Rewrite with identical content: hash matches the fingerprint.
  write_file(&temp, "stable.rs", "fn stable() {}\n");

  let deadline = tokio::time::Instant::now() + WAIT;
  while stats.snapshot().0 < 1 && tokio::time::Instant::now() < deadline {
    tokio::time::sleep(Duration::from_millis(25)).await;
  }

  let (processed, skipped, updates, _) = stats.snapshot();
  assert!(processed >= 1, "event should be processed");
  assert!(skipped >= 1, "identical content counts as skipped");
  assert_eq!(updates, 0, "no index update for identical content");

  cancel.cancel();
  let _ = handle.await;
}

#[tokio::test]
async fn events_in_denied_directories_are_ignored() {
  let temp = TempDir::new().unwrap();
  std::fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();

  let manager = open_fast_manager(&temp).await;
  manager.create_index(None).await.unwrap();

  let cancel = CancellationToken::new();
  let watcher = FileWatcher::new(manager.clone(), cancel.clone()).unwrap();
  let (stats, handle) = watcher.spawn();

  tokio::time::sleep(Duration::from_millis(200)).await;
  write_file(&temp, "node_modules/pkg/index.js", "module.exports = 1;\n");
  tokio::time::sleep(Duration::from_millis(500)).await;

  let (processed, _, updates, _) = stats.snapshot();
  assert_eq!(processed, 0, "denied paths are dropped before debounce");
  assert_eq!(updates, 0);
  assert!(manager.fingerprint_of("node_modules/pkg/index.js").await.is_none());

  cancel.cancel();
  let _ = handle.await;
}
