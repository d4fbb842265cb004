//! Scripted frame source for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::frame::Frame;
use crate::source::{AcquireError, CaptureRequest, DeviceHandle, FrameSource};

/// Shared observation handle for a [`MockFrameSource`].
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    releases: Arc<AtomicUsize>,
    frames_served: Arc<AtomicUsize>,
}

impl SourceProbe {
    /// Raw number of [`FrameSource::release`] calls, idempotent or not.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Number of [`FrameSource::current_frame`] calls, empty serves included.
    pub fn frames_served(&self) -> usize {
        self.frames_served.load(Ordering::SeqCst)
    }
}

/// Frame source whose acquisition outcome and frames are fully scripted.
pub struct MockFrameSource {
    outcome: Result<DeviceHandle, AcquireError>,
    queued: VecDeque<Frame>,
    steady: Option<Frame>,
    acquired: bool,
    probe: SourceProbe,
}

impl MockFrameSource {
    /// Source whose acquisition succeeds with the given geometry.
    pub fn granting(width: u32, height: u32) -> Self {
        Self {
            outcome: Ok(DeviceHandle {
                label: "mock-camera".to_string(),
                width,
                height,
            }),
            queued: VecDeque::new(),
            steady: None,
            acquired: false,
            probe: SourceProbe::default(),
        }
    }

    /// Source whose acquisition fails with `error`.
    pub fn failing(error: AcquireError) -> Self {
        Self {
            outcome: Err(error),
            queued: VecDeque::new(),
            steady: None,
            acquired: false,
            probe: SourceProbe::default(),
        }
    }

    /// Frames served one by one before the steady frame applies.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.queued = frames.into();
        self
    }

    /// Frame served on every call once the queue is exhausted.
    pub fn with_steady_frame(mut self, frame: Frame) -> Self {
        self.steady = Some(frame);
        self
    }

    /// Observation handle; take it before the source moves into a session.
    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn acquire(&mut self, _request: &CaptureRequest) -> Result<DeviceHandle, AcquireError> {
        let handle = self.outcome.clone()?;
        self.acquired = true;
        Ok(handle)
    }

    fn current_frame(&mut self) -> Frame {
        self.probe.frames_served.fetch_add(1, Ordering::SeqCst);
        if !self.acquired {
            return Frame::empty();
        }
        if let Some(frame) = self.queued.pop_front() {
            return frame;
        }
        self.steady.clone().unwrap_or_else(Frame::empty)
    }

    fn release(&mut self) {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        self.acquired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_queued_frames_then_the_steady_frame() {
        let mut source = MockFrameSource::granting(4, 2)
            .with_frames(vec![Frame::new(4, 2, vec![1; 8])])
            .with_steady_frame(Frame::new(4, 2, vec![2; 8]));
        source.acquire(&CaptureRequest::default()).await.unwrap();

        assert_eq!(source.current_frame().pixels, vec![1; 8]);
        assert_eq!(source.current_frame().pixels, vec![2; 8]);
        assert_eq!(source.current_frame().pixels, vec![2; 8]);
    }

    #[tokio::test]
    async fn failing_source_reports_its_error() {
        let mut source = MockFrameSource::failing(AcquireError::PermissionDenied);
        let err = source.acquire(&CaptureRequest::default()).await.unwrap_err();
        assert_eq!(err, AcquireError::PermissionDenied);
    }

    #[tokio::test]
    async fn probe_counts_every_release_call() {
        let mut source = MockFrameSource::granting(4, 2);
        let probe = source.probe();
        source.acquire(&CaptureRequest::default()).await.unwrap();
        source.release();
        source.release();
        assert_eq!(probe.releases(), 2);
    }
}
