//! File watcher: filesystem events in, index updates out.
//!
//! Bridges notify's sync callback into the async world over a channel,
//! debounces per path (most recent event wins), waits for writes to
//! settle, re-checks policy, skips events whose content hash matches the
//! stored fingerprint, and drives the `IndexManager`. Errors increment a
//! counter and never stop the loop.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
  config::WatchSettings,
  domain::compute_content_hash,
  index::{FileUpdate, IndexManager},
  policy::hardcoded_denied,
};

#[derive(Error, Debug)]
pub enum WatchError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),
  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

/// Event kinds surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
  Add,
  Change,
  Unlink,
}

/// An event as reported to the observer callback.
#[derive(Debug, Clone)]
pub struct WatchEvent {
  pub kind: WatchEventKind,
  pub path: PathBuf,
  pub relative_path: String,
}

/// Live counters; all loads/stores are relaxed, they are diagnostics.
#[derive(Debug)]
pub struct WatcherStats {
  pub events_processed: AtomicU64,
  pub events_skipped: AtomicU64,
  pub index_updates: AtomicU64,
  pub errors: AtomicU64,
  pub started_at: DateTime<Utc>,
}

impl WatcherStats {
  fn new() -> Self {
    Self {
      events_processed: AtomicU64::new(0),
      events_skipped: AtomicU64::new(0),
      index_updates: AtomicU64::new(0),
      errors: AtomicU64::new(0),
      started_at: Utc::now(),
    }
  }

  pub fn snapshot(&self) -> (u64, u64, u64, u64) {
    (
      self.events_processed.load(Ordering::Relaxed),
      self.events_skipped.load(Ordering::Relaxed),
      self.index_updates.load(Ordering::Relaxed),
      self.errors.load(Ordering::Relaxed),
    )
  }
}

/// A pending event being debounced. The most recent kind wins.
#[derive(Debug)]
struct PendingEvent {
  kind: WatchEventKind,
  last_event: Instant,
}

type EventObserver = Box<dyn Fn(&WatchEvent) + Send + Sync>;

/// The watcher task.
///
/// Holds the notify watcher alive for its whole run; dropping it stops
/// event delivery.
pub struct FileWatcher {
  root: PathBuf,
  settings: WatchSettings,
  manager: Arc<IndexManager>,
  cancel: CancellationToken,
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  stats: Arc<WatcherStats>,
  observer: Option<EventObserver>,
}

impl FileWatcher {
  pub fn new(manager: Arc<IndexManager>, cancel: CancellationToken) -> Result<Self, WatchError> {
    let root = manager.root().to_path_buf();
    let settings = manager.config().watch.clone();

    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // notify's thread: forward and drop on overflow.
        let _ = event_tx.blocking_send(res);
      },
      notify::Config::default(),
    )
    .map_err(WatchError::Init)?;

    watcher.watch(&root, RecursiveMode::Recursive).map_err(WatchError::Watch)?;
    info!(root = %root.display(), "File watcher initialized");

    Ok(Self {
      root,
      settings,
      manager,
      cancel,
      _watcher: watcher,
      event_rx,
      stats: Arc::new(WatcherStats::new()),
      observer: None,
    })
  }

  /// Install an observer notified after each processed event.
  pub fn with_observer(mut self, observer: EventObserver) -> Self {
    self.observer = Some(observer);
    self
  }

  pub fn stats(&self) -> Arc<WatcherStats> {
    self.stats.clone()
  }

  /// Spawn the run loop; returns the stats handle and the join handle.
  pub fn spawn(self) -> (Arc<WatcherStats>, tokio::task::JoinHandle<()>) {
    let stats = self.stats.clone();
    let handle = tokio::spawn(self.run());
    (stats, handle)
  }

  pub async fn run(mut self) {
    info!(root = %self.root.display(), "Watcher started");

    let mut pending: HashMap<PathBuf, PendingEvent> = HashMap::new();
    let debounce = Duration::from_millis(self.settings.debounce_ms);
    let mut tick = tokio::time::interval(debounce.min(Duration::from_millis(100)));

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("Watcher shutting down (cancelled)");
          break;
        }

        event = self.event_rx.recv() => {
          match event {
            Some(Ok(event)) => self.absorb_event(&mut pending, event),
            Some(Err(e)) => {
              warn!(error = %e, "Watcher backend error");
              self.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
            None => {
              info!("Watcher shutting down (channel closed)");
              break;
            }
          }
        }

        _ = tick.tick() => {
          self.flush_settled(&mut pending, debounce).await;
        }
      }
    }

    info!(root = %self.root.display(), "Watcher stopped");
  }

  /// Fold a raw notify event into the pending map.
  fn absorb_event(&self, pending: &mut HashMap<PathBuf, PendingEvent>, event: Event) {
    let kind = match event.kind {
      EventKind::Create(_) => WatchEventKind::Add,
      EventKind::Modify(_) => WatchEventKind::Change,
      EventKind::Remove(_) => WatchEventKind::Unlink,
      EventKind::Access(_) | EventKind::Any | EventKind::Other => return,
    };

    for path in event.paths {
      if path.is_dir() {
        continue;
      }
      let rel = path.strip_prefix(&self.root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
      // Watcher-level hardcoded denies: never even debounce churn from
      // node_modules, .git and friends.
      if hardcoded_denied(&rel) {
        trace!(path = %rel, "Dropping event in denied directory");
        continue;
      }

      trace!(path = %rel, kind = ?kind, "Event absorbed");
      // Most recent event wins.
      pending.insert(
        path,
        PendingEvent {
          kind,
          last_event: Instant::now(),
        },
      );
    }
  }

  async fn flush_settled(&mut self, pending: &mut HashMap<PathBuf, PendingEvent>, debounce: Duration) {
    let now = Instant::now();
    let settled: Vec<PathBuf> = pending
      .iter()
      .filter(|(_, p)| now.duration_since(p.last_event) >= debounce)
      .map(|(path, _)| path.clone())
      .collect();

    for path in settled {
      let Some(event) = pending.remove(&path) else {
        continue;
      };
      self.process(path, event.kind).await;
    }
  }

  async fn process(&self, path: PathBuf, kind: WatchEventKind) {
    self.stats.events_processed.fetch_add(1, Ordering::Relaxed);

    let rel = path
      .strip_prefix(&self.root)
      .unwrap_or(&path)
      .to_string_lossy()
      .replace('\\', "/");

    let outcome = match kind {
      WatchEventKind::Add | WatchEventKind::Change => self.process_upsert(&rel, &path).await,
      WatchEventKind::Unlink => self.process_unlink(&rel).await,
    };

    match outcome {
      Ok(true) => {
        self.stats.index_updates.fetch_add(1, Ordering::Relaxed);
      }
      Ok(false) => {
        self.stats.events_skipped.fetch_add(1, Ordering::Relaxed);
      }
      Err(e) => {
        warn!(path = %rel, error = %e, "Watcher event failed");
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
      }
    }

    if let Some(ref observer) = self.observer {
      observer(&WatchEvent {
        kind,
        relative_path: rel,
        path,
      });
    }
  }

  /// Handle add/change. Returns Ok(true) when the index changed.
  async fn process_upsert(&self, rel: &str, abs: &Path) -> Result<bool, crate::index::IndexError> {
    // The file may have vanished between the event and the flush.
    if !abs.exists() {
      return self.process_unlink(rel).await;
    }

    self.wait_for_write_finish(abs).await;

    // Policy re-check: config or gitignore may have changed since the
    // watcher started.
    if rel.ends_with(".gitignore") {
      self.manager.reload_policy()?;
    }
    let decision = self.manager.should_index(rel, abs);
    if !decision.allow {
      // A previously indexed file that is now denied gets evicted.
      if self.manager.fingerprint_of(rel).await.is_some() {
        self.manager.remove_file(rel).await?;
        return Ok(true);
      }
      debug!(path = rel, category = ?decision.category, "Event skipped by policy");
      return Ok(false);
    }

    // Unchanged content is a no-op.
    let bytes = std::fs::read(abs)?;
    let hash = compute_content_hash(&bytes);
    if let Some(fingerprint) = self.manager.fingerprint_of(rel).await
      && fingerprint.content_hash == hash
    {
      trace!(path = rel, "Content unchanged, skipping");
      return Ok(false);
    }

    match self.manager.update_file(rel).await? {
      FileUpdate::Skipped { reason } => {
        debug!(path = rel, reason, "Update skipped");
        Ok(false)
      }
      _ => Ok(true),
    }
  }

  async fn process_unlink(&self, rel: &str) -> Result<bool, crate::index::IndexError> {
    if self.manager.fingerprint_of(rel).await.is_none() {
      return Ok(false);
    }
    self.manager.remove_file(rel).await?;
    Ok(true)
  }

  /// Poll until the file stops changing (size + mtime stable for the
  /// configured threshold) so half-written files are not indexed.
  async fn wait_for_write_finish(&self, path: &Path) {
    let threshold = Duration::from_millis(self.settings.stability_threshold_ms);
    let poll = Duration::from_millis(self.settings.poll_interval_ms.max(10));
    let deadline = Instant::now() + threshold * 4;

    let snapshot = |p: &Path| {
      std::fs::metadata(p)
        .ok()
        .map(|m| (m.len(), m.modified().ok()))
    };

    let mut last = snapshot(path);
    let mut stable_since = Instant::now();

    while Instant::now() < deadline {
      tokio::time::sleep(poll).await;
      let current = snapshot(path);
      if current != last {
        last = current;
        stable_since = Instant::now();
      } else if stable_since.elapsed() >= threshold {
        return;
      }
    }
  }
}
