//! Periodic scan loop.
//!
//! The scheduler drives the capture/decode cycle: on a fixed period it
//! snapshots the current frame, hands it to the decode worker and picks up
//! the asynchronous response. At most one decode request is outstanding at
//! any instant. Ticks that land while a request is in flight are dropped,
//! not queued, so a slow decoder can never grow a backlog; the next tick
//! simply captures a fresher frame.
//!
//! The loop runs as one cancellable tokio task that owns the frame source
//! and the decode worker outright. Whichever way it exits, it terminates
//! the worker and releases the capture device before returning, and it is
//! the only context that ever mutates cycle state. The worker communicates
//! purely through its response channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ScanConfig;
use crate::decode::protocol::{WorkerResponse, EAN13_TYPE_NAME};
use crate::decode::{DecodeEngine, DecodeRequest, DecodeWorker};
use crate::error::{AppResult, ScanError};
use crate::latency::LatencyWindow;
use crate::session::{ResultHandler, StatusPublisher, STATUS_STALLED};
use crate::source::FrameSource;

/// Runtime control accepted by a running scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Stop issuing decode requests until resumed.
    Pause,
    /// Lift a pause or a post-recognition suspension.
    Resume,
}

/// Handle to a spawned scan loop.
///
/// Dropping the handle signals the loop to shut down on its own; [`stop`]
/// additionally waits for the cleanup to finish and reports its errors.
///
/// [`stop`]: SchedulerHandle::stop
pub struct SchedulerHandle {
    task: JoinHandle<Vec<ScanError>>,
    control: mpsc::Sender<SchedulerCommand>,
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Suspends ticking. A response already in flight is still processed.
    pub async fn pause(&self) {
        let _ = self.control.send(SchedulerCommand::Pause).await;
    }

    /// Resumes ticking after a pause or a recognized symbol.
    pub async fn resume(&self) {
        let _ = self.control.send(SchedulerCommand::Resume).await;
    }

    /// Stops the loop and waits for its cleanup to complete.
    pub async fn stop(self) -> Vec<ScanError> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(errors) => errors,
            Err(err) => vec![ScanError::Task(err.to_string())],
        }
    }
}

/// Starts the scan loop on the current runtime.
///
/// The loop takes ownership of `source` and `worker` and tears both down
/// when it exits.
pub fn spawn(
    config: ScanConfig,
    source: Box<dyn FrameSource>,
    worker: DecodeWorker,
    engine: Arc<dyn DecodeEngine>,
    status: Arc<StatusPublisher>,
    on_result: ResultHandler,
) -> SchedulerHandle {
    let (control_tx, control_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scan_loop = ScanLoop {
        config,
        source,
        worker,
        engine,
        status,
        on_result,
        control_rx,
        shutdown_rx,
    };
    SchedulerHandle {
        task: tokio::spawn(scan_loop.run()),
        control: control_tx,
        shutdown: shutdown_tx,
    }
}

/// A decode request the loop is waiting on.
#[derive(Debug, Clone, Copy)]
struct Outstanding {
    sequence: u64,
    started_at: Instant,
}

/// Cycle bookkeeping, owned by the loop and mutated by it alone.
#[derive(Debug)]
struct CycleState {
    sequence: u64,
    outstanding: Option<Outstanding>,
    window: LatencyWindow,
    suspended: bool,
    live: bool,
}

impl CycleState {
    fn new(window_capacity: usize) -> Self {
        Self {
            sequence: 0,
            outstanding: None,
            window: LatencyWindow::new(window_capacity),
            suspended: false,
            live: false,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Everything the spawned task owns.
struct ScanLoop {
    config: ScanConfig,
    source: Box<dyn FrameSource>,
    worker: DecodeWorker,
    engine: Arc<dyn DecodeEngine>,
    status: Arc<StatusPublisher>,
    on_result: ResultHandler,
    control_rx: mpsc::Receiver<SchedulerCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ScanLoop {
    async fn run(self) -> Vec<ScanError> {
        let ScanLoop {
            config,
            mut source,
            mut worker,
            engine,
            status,
            mut on_result,
            mut control_rx,
            mut shutdown_rx,
        } = self;

        let Some(mut responses) = worker.take_responses() else {
            source.release();
            return vec![ScanError::DecoderGone];
        };

        let mut errors = Vec::new();
        let mut cycle = CycleState::new(config.latency_window);

        let mut interval = interval(config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let timeout = config.decode_timeout();
        let watchdog = tokio::time::sleep(Duration::from_secs(0));
        tokio::pin!(watchdog);

        info!("Scan loop started with a {} ms period", config.interval_ms);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if cycle.suspended || cycle.outstanding.is_some() {
                        continue;
                    }
                    let started_at = Instant::now();
                    let frame = source.current_frame();
                    if frame.is_empty() {
                        // Device still warming up; not an error.
                        continue;
                    }
                    if !cycle.live {
                        cycle.live = true;
                        status.mark_live();
                        info!("First live frame: {}x{}", frame.width, frame.height);
                    }
                    if frame.dimensions() != worker.dimensions() {
                        let (old_w, old_h) = worker.dimensions();
                        info!(
                            "Frame geometry changed from {}x{} to {}x{}, rebuilding decode worker",
                            old_w, old_h, frame.width, frame.height
                        );
                        match rebuild_worker(&mut worker, frame.width, frame.height, &engine).await {
                            Ok(rx) => responses = rx,
                            Err(err) => {
                                error!("Could not rebuild decode worker: {}", err);
                                status.fault(STATUS_STALLED);
                                errors.push(err);
                                break;
                            }
                        }
                    }
                    let sequence = cycle.next_sequence();
                    match worker.submit(DecodeRequest { sequence, frame }) {
                        Ok(()) => {
                            cycle.outstanding = Some(Outstanding { sequence, started_at });
                            if let Some(timeout) = timeout {
                                watchdog.as_mut().reset(Instant::now() + timeout);
                            }
                        }
                        Err(ScanError::DecoderBusy) => {
                            debug!("Decoder busy, dropping tick for request {}", sequence);
                        }
                        Err(err) => {
                            warn!("Decode submit failed for request {}: {}", sequence, err);
                        }
                    }
                }
                response = responses.recv() => {
                    match response {
                        Some(WorkerResponse::Scan { sequence, result }) => {
                            let Some(outstanding) = cycle.outstanding else {
                                warn!("Discarding stale decode response {}", sequence);
                                continue;
                            };
                            if outstanding.sequence != sequence {
                                warn!(
                                    "Discarding stale decode response {} while waiting on {}",
                                    sequence, outstanding.sequence
                                );
                                continue;
                            }
                            cycle.outstanding = None;
                            let elapsed_ms =
                                outstanding.started_at.elapsed().as_secs_f64() * 1000.0;
                            cycle.window.push(elapsed_ms);
                            status.set_latency(cycle.window.mean_ms());
                            status.mark_live();
                            let symbol =
                                result.iter().find(|s| s.type_name == EAN13_TYPE_NAME);
                            if let Some(symbol) = symbol {
                                let payload = symbol.payload_text();
                                info!("Recognized symbol {} on request {}", payload, sequence);
                                cycle.suspended = true;
                                on_result(payload);
                            }
                        }
                        None => {
                            warn!("Decode worker stopped answering, rebuilding");
                            cycle.outstanding = None;
                            let (width, height) = worker.dimensions();
                            match rebuild_worker(&mut worker, width, height, &engine).await {
                                Ok(rx) => responses = rx,
                                Err(err) => {
                                    error!("Could not rebuild decode worker: {}", err);
                                    status.fault(STATUS_STALLED);
                                    errors.push(err);
                                    break;
                                }
                            }
                        }
                    }
                }
                _ = watchdog.as_mut(), if cycle.outstanding.is_some() && timeout.is_some() => {
                    if let Some(outstanding) = cycle.outstanding.take() {
                        warn!(
                            "Decode request {} timed out after {} ms, resuming cadence",
                            outstanding.sequence,
                            outstanding.started_at.elapsed().as_millis()
                        );
                    }
                    status.mark_stalled();
                }
                command = control_rx.recv() => {
                    match command {
                        Some(SchedulerCommand::Pause) => {
                            debug!("Scan loop paused");
                            cycle.suspended = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            debug!("Scan loop resumed");
                            cycle.suspended = false;
                        }
                        None => break,
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Scan loop shutdown requested");
                    break;
                }
            }
        }

        drop(responses);
        if let Err(err) = worker.terminate().await {
            warn!("Decode worker shutdown failed: {}", err);
            errors.push(err);
        }
        source.release();
        info!("Scan loop stopped");
        errors
    }
}

/// Spawns a replacement worker before terminating the old one, so a failed
/// spawn leaves the current worker intact.
async fn rebuild_worker(
    worker: &mut DecodeWorker,
    width: u32,
    height: u32,
    engine: &Arc<dyn DecodeEngine>,
) -> AppResult<mpsc::UnboundedReceiver<WorkerResponse>> {
    let mut next = DecodeWorker::spawn(width, height, Arc::clone(engine))?;
    let responses = next.take_responses().ok_or(ScanError::DecoderGone)?;
    if let Err(err) = worker.terminate().await {
        warn!("Previous decode worker did not shut down cleanly: {}", err);
    }
    *worker = next;
    Ok(responses)
}
