//! Compute-device selection for the embedding backend.
//!
//! Preference order: a WebGPU adapter when the host environment provides
//! one, DirectML on native Windows, otherwise CPU with a recorded reason.
//! Detection runs once and is cached; `force_refresh` re-probes. The probe
//! is bounded by a timeout so a wedged driver cannot stall startup.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

/// Upper bound on a single detection probe.
pub const DETECTION_TIMEOUT_MS: u64 = 5000;

/// Reasons recorded when detection falls back to CPU.
pub mod fallback_reasons {
  pub const NOT_WINDOWS: &str = "DirectML requires Windows";
  pub const DETECTION_TIMEOUT: &str = "device detection timed out";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  WebGpu,
  Dml,
  Cpu,
}

impl Device {
  pub fn as_str(&self) -> &'static str {
    match self {
      Device::WebGpu => "webgpu",
      Device::Dml => "dml",
      Device::Cpu => "cpu",
    }
  }
}

/// The outcome of detection: a device, plus the reason when it is a
/// fallback rather than a first choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDecision {
  pub device: Device,
  pub reason: Option<String>,
}

impl DeviceDecision {
  pub fn is_gpu(&self) -> bool {
    matches!(self.device, Device::WebGpu | Device::Dml)
  }

  pub fn is_cpu(&self) -> bool {
    self.device == Device::Cpu
  }
}

/// Result of a WebGPU adapter probe.
type AdapterProbe = Box<dyn Fn() -> bool + Send + Sync>;

/// Caching device detector.
///
/// Both inputs are injectable: embedders running under a host that
/// exposes a WebGPU adapter (e.g. an editor webview) supply a real probe,
/// and the platform predicate defaults to the compile target but can be
/// pinned so both branches run under any test runner. The default probe
/// reports no adapter, which is correct for a plain native process.
pub struct DeviceDetector {
  probe: AdapterProbe,
  windows: bool,
  cached: Mutex<Option<DeviceDecision>>,
}

impl Default for DeviceDetector {
  fn default() -> Self {
    Self::new(Box::new(|| false))
  }
}

impl DeviceDetector {
  pub fn new(probe: AdapterProbe) -> Self {
    Self::with_platform(probe, cfg!(windows))
  }

  /// Construct with an explicit platform answer instead of the compile
  /// target.
  pub fn with_platform(probe: AdapterProbe, windows: bool) -> Self {
    Self {
      probe,
      windows,
      cached: Mutex::new(None),
    }
  }

  /// Detect the best device, reusing the cached decision when present.
  pub async fn detect(&self) -> DeviceDecision {
    let mut cached = self.cached.lock().await;
    if let Some(ref decision) = *cached {
      return decision.clone();
    }

    let decision = self.run_probe().await;
    debug!(device = decision.device.as_str(), reason = ?decision.reason, "Device detected");
    *cached = Some(decision.clone());
    decision
  }

  /// Drop the cache and re-probe.
  pub async fn force_refresh(&self) -> DeviceDecision {
    {
      let mut cached = self.cached.lock().await;
      *cached = None;
    }
    self.detect().await
  }

  async fn run_probe(&self) -> DeviceDecision {
    let has_adapter = tokio::time::timeout(Duration::from_millis(DETECTION_TIMEOUT_MS), async {
      (self.probe)()
    })
    .await;

    match has_adapter {
      Ok(true) => DeviceDecision {
        device: Device::WebGpu,
        reason: None,
      },
      // DirectML is the first choice on native Windows, not a fallback.
      Ok(false) if self.windows => DeviceDecision {
        device: Device::Dml,
        reason: None,
      },
      Ok(false) => DeviceDecision {
        device: Device::Cpu,
        reason: Some(fallback_reasons::NOT_WINDOWS.to_string()),
      },
      Err(_) => DeviceDecision {
        device: Device::Cpu,
        reason: Some(fallback_reasons::DETECTION_TIMEOUT.to_string()),
      },
    }
  }
}
