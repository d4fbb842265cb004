//! Session lifecycle controller.
//!
//! A [`ScanSession`] owns the startup and teardown of the whole pipeline.
//! Starting a session walks the acquisition sequence and ends in exactly
//! one of three places: `Running` with the scan loop ticking, or one of
//! the terminal failure states when the device could not be acquired.
//! Failures never surface as `Err` from [`ScanSession::start`]; the caller
//! reads one consistent surface, the lifecycle state and the status
//! subscription, and decides for itself whether to prompt the user again.
//!
//! Teardown is best-effort: every cleanup step runs even when an earlier
//! one fails, and the collected errors come back aggregated.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::ScannerConfig;
use crate::decode::{DecodeEngine, DecodeWorker};
use crate::error::{AppResult, ScanError};
use crate::scheduler::{self, SchedulerHandle};
use crate::source::{AcquireError, CaptureRequest, DeviceHandle, FrameSource};

// =========================================================================
// Lifecycle states and status lines
// =========================================================================

/// Coarse phase of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session activity yet.
    Idle,
    /// Waiting on device acquisition.
    AcquiringDevice,
    /// Camera permission was refused. Terminal.
    DeviceDenied,
    /// No capable device, or the device failed to start. Terminal.
    DeviceUnavailable,
    /// The scan loop is active.
    Running,
    /// The session was torn down. Terminal.
    Stopped,
}

impl LifecycleState {
    /// States a session never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::DeviceDenied | Self::DeviceUnavailable | Self::Stopped
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AcquiringDevice => "acquiring device",
            Self::DeviceDenied => "device denied",
            Self::DeviceUnavailable => "device unavailable",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// Status line before the session starts.
pub const STATUS_LOADING: &str = "Loading...";
/// Status line while waiting for device access.
pub const STATUS_ACQUIRING: &str = "Setting up camera...";
/// Status line after a permission refusal.
pub const STATUS_DENIED: &str = "Camera access denied";
/// Status line when no capable device exists.
pub const STATUS_UNSUPPORTED: &str = "Your device does not support camera";
/// Status line after a device failure.
pub const STATUS_DEVICE_FAILED: &str = "Failed to access camera";
/// Status line between acquisition and the first live frame.
pub const STATUS_WARMUP: &str = "Setting up video...";
/// Status line while frames are flowing.
pub const STATUS_RUNNING: &str = "Running...";
/// Status line while the decoder misses its deadline.
pub const STATUS_STALLED: &str = "Decoder stalled, recovering...";
/// Status line after teardown.
pub const STATUS_STOPPED: &str = "Stopped";

/// Snapshot published to status subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStatus {
    /// Current lifecycle phase.
    pub state: LifecycleState,
    /// Human-readable status line.
    pub message: String,
    /// Whether live frames are flowing.
    pub ready: bool,
    /// Rolling mean decode latency in milliseconds, one decimal.
    pub mean_latency_ms: f64,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            state: LifecycleState::Idle,
            message: STATUS_LOADING.to_string(),
            ready: false,
            mean_latency_ms: 0.0,
        }
    }
}

// =========================================================================
// Status publishing
// =========================================================================

/// Publisher side of the status subscription.
///
/// Shared between the session and its scan loop. Every mutation goes
/// through one of the helpers so subscribers always observe a complete
/// snapshot, never a half-updated one.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<ScanStatus>,
}

impl StatusPublisher {
    fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(ScanStatus::default());
        Arc::new(Self { tx })
    }

    /// Enters a new phase with its status line.
    pub(crate) fn transition(&self, state: LifecycleState, message: &str, ready: bool) {
        self.tx.send_modify(|status| {
            status.state = state;
            status.message = message.to_string();
            status.ready = ready;
        });
        info!("Status: {} ({})", message, state);
    }

    /// Marks frames as flowing. No notification when already live.
    pub(crate) fn mark_live(&self) {
        self.tx.send_if_modified(|status| {
            if status.ready && status.message == STATUS_RUNNING {
                return false;
            }
            status.message = STATUS_RUNNING.to_string();
            status.ready = true;
            true
        });
    }

    /// Flags a decoder that missed its deadline. Ticking continues.
    pub(crate) fn mark_stalled(&self) {
        self.tx.send_modify(|status| {
            status.message = STATUS_STALLED.to_string();
        });
    }

    /// Drops readiness with a diagnostic message.
    pub(crate) fn fault(&self, message: &str) {
        self.tx.send_modify(|status| {
            status.message = message.to_string();
            status.ready = false;
        });
    }

    /// Publishes a new rolling mean latency, rounded to one decimal.
    pub(crate) fn set_latency(&self, mean_ms: f64) {
        self.tx.send_modify(|status| {
            status.mean_latency_ms = (mean_ms * 10.0).round() / 10.0;
        });
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ScanStatus {
        self.tx.borrow().clone()
    }

    /// New subscription delivering every later update.
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.tx.subscribe()
    }
}

/// Callback invoked with the decoded payload text on every recognition.
pub type ResultHandler = Box<dyn FnMut(String) + Send>;

// =========================================================================
// Session
// =========================================================================

/// One capture session from acquisition to teardown.
///
/// Dropping a running session signals its scan loop to shut down on its
/// own; [`ScanSession::stop`] additionally waits for the cleanup and
/// reports its errors.
pub struct ScanSession {
    state: LifecycleState,
    history: Vec<LifecycleState>,
    status: Arc<StatusPublisher>,
    scheduler: Option<SchedulerHandle>,
    device: Option<DeviceHandle>,
}

impl ScanSession {
    /// Runs the startup sequence and returns the session in whatever state
    /// it reached.
    ///
    /// On success the session owns a running scan loop; `source` and the
    /// decode worker move into that loop and are torn down with it. On an
    /// acquisition failure the session lands in the matching terminal
    /// state and `source` is released immediately. No retries in either
    /// case.
    pub async fn start(
        config: &ScannerConfig,
        mut source: Box<dyn FrameSource>,
        engine: Arc<dyn DecodeEngine>,
        on_result: ResultHandler,
    ) -> Self {
        let status = StatusPublisher::new();
        let mut session = Self {
            state: LifecycleState::Idle,
            history: vec![LifecycleState::Idle],
            status: Arc::clone(&status),
            scheduler: None,
            device: None,
        };

        session.enter(LifecycleState::AcquiringDevice, STATUS_ACQUIRING, false);

        let request = CaptureRequest::from_config(&config.capture);
        let device = match source.acquire(&request).await {
            Ok(device) => device,
            Err(err) => {
                warn!("Device acquisition failed: {}", err);
                source.release();
                let (state, message) = match &err {
                    AcquireError::PermissionDenied => {
                        (LifecycleState::DeviceDenied, STATUS_DENIED)
                    }
                    AcquireError::Unsupported => {
                        (LifecycleState::DeviceUnavailable, STATUS_UNSUPPORTED)
                    }
                    AcquireError::DeviceError(detail) => {
                        error!("Capture device failed to start: {}", detail);
                        (LifecycleState::DeviceUnavailable, STATUS_DEVICE_FAILED)
                    }
                };
                session.enter(state, message, false);
                return session;
            }
        };
        info!(
            "Acquired capture device '{}' at {}x{}",
            device.label, device.width, device.height
        );

        let worker = match DecodeWorker::spawn(device.width, device.height, Arc::clone(&engine)) {
            Ok(worker) => worker,
            Err(err) => {
                error!("Could not start the decode worker: {}", err);
                source.release();
                session.enter(LifecycleState::DeviceUnavailable, STATUS_DEVICE_FAILED, false);
                return session;
            }
        };

        session.device = Some(device);
        session.scheduler = Some(scheduler::spawn(
            config.scan.clone(),
            source,
            worker,
            engine,
            Arc::clone(&status),
            on_result,
        ));
        session.enter(LifecycleState::Running, STATUS_WARMUP, false);
        session
    }

    fn enter(&mut self, state: LifecycleState, message: &str, ready: bool) {
        self.state = state;
        self.history.push(state);
        self.status.transition(state, message, ready);
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every lifecycle phase entered so far, in order.
    pub fn state_history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Latest published status snapshot.
    pub fn status(&self) -> ScanStatus {
        self.status.snapshot()
    }

    /// Status subscription for the rendering layer.
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.subscribe()
    }

    /// The acquired device, when the session reached `Running`.
    pub fn device(&self) -> Option<&DeviceHandle> {
        self.device.as_ref()
    }

    /// Suspends ticking without tearing anything down. Best effort.
    pub async fn pause(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.pause().await;
        }
    }

    /// Resumes ticking after a pause or a recognized symbol. Best effort.
    pub async fn resume(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.resume().await;
        }
    }

    /// Tears the session down: cancels the cadence, terminates the decode
    /// worker and releases the device, continuing past individual
    /// failures. Idempotent; on a session that never reached `Running`
    /// this is a no-op that preserves the terminal state.
    pub async fn stop(&mut self) -> AppResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        let errors = match self.scheduler.take() {
            Some(scheduler) => scheduler.stop().await,
            None => Vec::new(),
        };
        self.enter(LifecycleState::Stopped, STATUS_STOPPED, false);
        if errors.is_empty() {
            info!("Session stopped");
            Ok(())
        } else {
            warn!("Session stopped with {} cleanup errors", errors.len());
            Err(ScanError::ShutdownFailed(errors))
        }
    }
}
