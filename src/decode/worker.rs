//! Dedicated decode worker thread.
//!
//! Decoding is CPU bound and must never stall the capture cadence, so each
//! worker owns one OS thread and talks to the scheduler over channels. The
//! request channel has capacity one: a worker only ever holds a single
//! undelivered request, and a full channel surfaces as
//! [`ScanError::DecoderBusy`] instead of queueing stale frames.
//!
//! A worker is built for fixed frame dimensions. When the capture geometry
//! changes the scheduler terminates the worker and spawns a fresh one rather
//! than reconfiguring it in place.

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::decode::protocol::{WorkerRequest, WorkerResponse};
use crate::decode::{DecodeEngine, DecodeRequest};
use crate::error::{AppResult, ScanError};
use crate::frame::Frame;

/// Handle to a running decode thread.
pub struct DecodeWorker {
    width: u32,
    height: u32,
    request_tx: Option<mpsc::Sender<WorkerRequest>>,
    response_rx: Option<mpsc::UnboundedReceiver<WorkerResponse>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    /// Spawns a worker thread configured for `width` x `height` frames.
    ///
    /// The init record carrying the dimensions is handed to the thread at
    /// construction, ahead of any scan request, so the single channel slot
    /// is free for the first scan the moment `spawn` returns.
    pub fn spawn(width: u32, height: u32, engine: Arc<dyn DecodeEngine>) -> AppResult<Self> {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let init = WorkerRequest::Init {
            dimensions: [width, height],
        };
        let thread = thread::Builder::new()
            .name("barscan-decode".into())
            .spawn(move || worker_loop(init, request_rx, response_tx, engine))?;

        Ok(Self {
            width,
            height,
            request_tx: Some(request_tx),
            response_rx: Some(response_rx),
            thread: Some(thread),
        })
    }

    /// Dimensions this worker was built for.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Hands a frame to the worker without waiting for the result.
    ///
    /// Returns [`ScanError::DecoderBusy`] when the worker has not picked up
    /// the previous request yet and [`ScanError::DecoderGone`] once the
    /// worker has been terminated.
    pub fn submit(&mut self, request: DecodeRequest) -> AppResult<()> {
        let Some(tx) = self.request_tx.as_ref() else {
            return Err(ScanError::DecoderGone);
        };
        let frame = request.frame;
        if frame.dimensions() != (self.width, self.height) {
            return Err(ScanError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: frame.width,
                actual_height: frame.height,
            });
        }
        tx.try_send(WorkerRequest::Scan {
            sequence: request.sequence,
            data: frame.pixels,
        })
        .map_err(|err| match err {
            TrySendError::Full(_) => ScanError::DecoderBusy,
            TrySendError::Closed(_) => ScanError::DecoderGone,
        })
    }

    /// Takes the response stream. Responses arrive in submission order,
    /// exactly one per accepted scan request.
    pub fn take_responses(&mut self) -> Option<mpsc::UnboundedReceiver<WorkerResponse>> {
        self.response_rx.take()
    }

    /// Shuts the worker down and joins its thread. Safe to call twice.
    pub async fn terminate(&mut self) -> AppResult<()> {
        self.request_tx = None;
        self.response_rx = None;
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| ScanError::DecoderGone)?
            .map_err(|_| ScanError::DecoderGone)
    }
}

fn worker_loop(
    init: WorkerRequest,
    mut requests: mpsc::Receiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
    engine: Arc<dyn DecodeEngine>,
) {
    let mut width = 0u32;
    let mut height = 0u32;

    let mut next = Some(init);
    loop {
        let request = match next.take() {
            Some(request) => request,
            None => match requests.blocking_recv() {
                Some(request) => request,
                None => break,
            },
        };
        match request {
            WorkerRequest::Init {
                dimensions: [w, h],
            } => {
                width = w;
                height = h;
            }
            WorkerRequest::Scan { sequence, data } => {
                let expected = width as usize * height as usize;
                let result = if expected > 0 && data.len() == expected {
                    engine.decode(&Frame::new(width, height, data))
                } else {
                    debug!(
                        sequence,
                        len = data.len(),
                        expected,
                        "dropping malformed scan payload"
                    );
                    Vec::new()
                };
                if responses
                    .send(WorkerResponse::Scan { sequence, result })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::decode::mock::MockEngine;
    use crate::decode::protocol::Symbol;

    fn blank_request(sequence: u64, width: u32, height: u32) -> DecodeRequest {
        DecodeRequest {
            sequence,
            frame: Frame::new(width, height, vec![0; (width * height) as usize]),
        }
    }

    #[tokio::test]
    async fn round_trips_a_scan_request() {
        let engine = MockEngine::returning(vec![Symbol::ean13("4607004345302")]);
        let mut worker = DecodeWorker::spawn(4, 2, Arc::new(engine)).unwrap();
        let mut responses = worker.take_responses().unwrap();

        worker.submit(blank_request(1, 4, 2)).unwrap();
        let WorkerResponse::Scan { sequence, result } = responses.recv().await.unwrap();
        assert_eq!(sequence, 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].payload_text(), "4607004345302");

        worker.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_frames_with_other_dimensions() {
        let mut worker = DecodeWorker::spawn(4, 2, Arc::new(MockEngine::empty())).unwrap();
        let err = worker.submit(blank_request(1, 2, 2)).unwrap_err();
        assert!(matches!(err, ScanError::DimensionMismatch { .. }));
        worker.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn reports_busy_while_the_thread_is_saturated() {
        let engine = MockEngine::empty().with_delay(Duration::from_millis(500));
        let mut worker = DecodeWorker::spawn(2, 2, Arc::new(engine)).unwrap();
        let mut responses = worker.take_responses().unwrap();

        worker.submit(blank_request(1, 2, 2)).unwrap();
        // Give the thread time to dequeue the first request and start its
        // slow decode, then fill the single channel slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.submit(blank_request(2, 2, 2)).unwrap();
        let err = worker.submit(blank_request(3, 2, 2)).unwrap_err();
        assert!(matches!(err, ScanError::DecoderBusy));

        // Both accepted requests still answer, in order.
        let WorkerResponse::Scan { sequence, .. } = responses.recv().await.unwrap();
        assert_eq!(sequence, 1);
        let WorkerResponse::Scan { sequence, .. } = responses.recv().await.unwrap();
        assert_eq!(sequence, 2);

        worker.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let mut worker = DecodeWorker::spawn(2, 2, Arc::new(MockEngine::empty())).unwrap();
        worker.terminate().await.unwrap();
        worker.terminate().await.unwrap();
        let err = worker.submit(blank_request(1, 2, 2)).unwrap_err();
        assert!(matches!(err, ScanError::DecoderGone));
    }

    #[tokio::test]
    async fn malformed_payload_yields_an_empty_result() {
        let engine = MockEngine::returning(vec![Symbol::ean13("4607004345302")]);
        let probe = engine.probe();
        let mut worker = DecodeWorker::spawn(4, 2, Arc::new(engine)).unwrap();
        let mut responses = worker.take_responses().unwrap();

        // Matching dimensions but a short pixel buffer; the worker refuses
        // to hand it to the engine.
        worker
            .submit(DecodeRequest {
                sequence: 9,
                frame: Frame::new(4, 2, vec![0; 5]),
            })
            .unwrap();
        let WorkerResponse::Scan { sequence, result } = responses.recv().await.unwrap();
        assert_eq!(sequence, 9);
        assert!(result.is_empty());
        assert_eq!(probe.calls(), 0);

        worker.terminate().await.unwrap();
    }
}
