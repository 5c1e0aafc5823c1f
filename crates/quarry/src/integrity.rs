//! Integrity: drift detection and reconciliation.
//!
//! Drift is divergence between the file system and the persisted
//! fingerprints (files changed while no watcher was running, a crash
//! between store and fingerprint writes, manual edits to the index
//! directory). The engine scans under policy, diffs against fingerprints,
//! and applies the resulting delta through the `IndexManager`, refusing
//! when an indexing run is already active.
//!
//! A scheduler runs reconciliation on an interval (default 24 h), and a
//! non-blocking startup check heals drift accumulated while the process
//! was down. The startup check swallows every error after logging it: a
//! corrupt index must never prevent the process from starting.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::index::{DeltaOutcome, IndexManager};

/// Result of a drift check.
#[derive(Debug, Clone)]
pub struct DriftReport {
  pub added: Vec<String>,
  pub modified: Vec<String>,
  pub removed: Vec<String>,
  /// Files whose fingerprint matches the file system.
  pub in_sync: usize,
  pub last_checked: DateTime<Utc>,
}

impl DriftReport {
  pub fn has_drift(&self) -> bool {
    !self.added.is_empty() || !self.modified.is_empty() || !self.removed.is_empty()
  }

  pub fn drift_count(&self) -> usize {
    self.added.len() + self.modified.len() + self.removed.len()
  }
}

/// Result of a reconcile run.
#[derive(Debug, Default)]
pub struct ReconcileResult {
  pub success: bool,
  pub applied: usize,
  pub errors: Vec<String>,
}

/// Drift checker + reconciler, holding a non-owning handle to the manager.
pub struct IntegrityEngine {
  manager: Arc<IndexManager>,
  last_check: Mutex<Option<DateTime<Utc>>>,
}

impl IntegrityEngine {
  pub fn new(manager: Arc<IndexManager>) -> Self {
    Self {
      manager,
      last_check: Mutex::new(None),
    }
  }

  /// Scan the project under policy and diff against fingerprints.
  pub async fn check_drift(&self) -> DriftReport {
    let scan = self.manager.scan_current_state();
    let delta = self.manager.compute_delta(&scan).await;
    let now = Utc::now();

    *self.last_check.lock().await = Some(now);

    DriftReport {
      in_sync: delta.unchanged.len(),
      added: delta.added,
      modified: delta.modified,
      removed: delta.removed,
      last_checked: now,
    }
  }

  /// Detect drift and apply the implied delta.
  ///
  /// Refuses while an indexing run is active; reconciling against a store
  /// that a full index is concurrently rewriting would interleave writes.
  pub async fn reconcile(&self) -> ReconcileResult {
    if self.manager.indexing_active_flag().load(std::sync::atomic::Ordering::SeqCst) {
      return ReconcileResult {
        success: false,
        applied: 0,
        errors: vec!["Indexing is already in progress".to_string()],
      };
    }

    let report = self.check_drift().await;
    if !report.has_drift() {
      debug!(in_sync = report.in_sync, "No drift detected");
      return ReconcileResult {
        success: true,
        ..Default::default()
      };
    }

    info!(
      added = report.added.len(),
      modified = report.modified.len(),
      removed = report.removed.len(),
      "Reconciling drift"
    );

    let delta = crate::fingerprint::FileDelta {
      added: report.added,
      modified: report.modified,
      removed: report.removed,
      unchanged: Vec::new(),
    };
    let DeltaOutcome { success, applied, errors } = self.manager.apply_delta(&delta, None).await;

    ReconcileResult {
      success,
      applied,
      errors,
    }
  }

  pub async fn last_check_time(&self) -> Option<DateTime<Utc>> {
    *self.last_check.lock().await
  }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Periodic reconciliation driver.
pub struct IntegrityScheduler {
  engine: Arc<IntegrityEngine>,
  interval: Duration,
  cancel: Mutex<Option<CancellationToken>>,
}

impl IntegrityScheduler {
  pub fn new(engine: Arc<IntegrityEngine>, interval_ms: u64) -> Self {
    Self {
      engine,
      interval: Duration::from_millis(interval_ms),
      cancel: Mutex::new(None),
    }
  }

  /// Start the periodic loop. Idempotent; a running loop is left alone.
  pub async fn start(&self) {
    let mut cancel_slot = self.cancel.lock().await;
    if cancel_slot.is_some() {
      return;
    }

    let cancel = CancellationToken::new();
    *cancel_slot = Some(cancel.clone());

    let engine = self.engine.clone();
    let interval = self.interval;
    tokio::spawn(async move {
      let mut timer = tokio::time::interval(interval);
      // The immediate first tick; startup reconciliation is separate.
      timer.tick().await;

      loop {
        tokio::select! {
          biased;

          _ = cancel.cancelled() => {
            info!("Integrity scheduler stopped");
            break;
          }

          _ = timer.tick() => {
            let result = engine.reconcile().await;
            if !result.success {
              warn!(errors = ?result.errors, "Scheduled reconcile failed");
            }
          }
        }
      }
    });

    info!(interval_ms = self.interval.as_millis() as u64, "Integrity scheduler started");
  }

  pub async fn stop(&self) {
    if let Some(cancel) = self.cancel.lock().await.take() {
      cancel.cancel();
    }
  }

  /// Run one reconcile immediately, outside the schedule.
  pub async fn run_now(&self) -> ReconcileResult {
    self.engine.reconcile().await
  }

  pub async fn last_check_time(&self) -> Option<DateTime<Utc>> {
    self.engine.last_check_time().await
  }
}

/// Fire-and-forget startup check.
///
/// Never blocks the caller and never lets an error escape: integrity
/// problems at startup are logged and left for the scheduled runs.
pub fn run_startup_check_background(engine: Arc<IntegrityEngine>) {
  tokio::spawn(async move {
    debug!("Startup integrity check running");
    let result = engine.reconcile().await;
    if result.success {
      info!(applied = result.applied, "Startup integrity check complete");
    } else {
      warn!(errors = ?result.errors, "Startup integrity check failed (ignored)");
    }
  });
}
