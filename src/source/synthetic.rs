//! Simulated capture device.
//!
//! Renders frames that a real decoder can recognize: a light noise
//! background with one EAN-13 bar band across the middle. Used by the demo
//! binary and the end-to-end tests, where a hardware camera is not an
//! option.

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::decode::ean13;
use crate::frame::Frame;
use crate::source::{AcquireError, CaptureRequest, DeviceHandle, FrameSource};

const DEFAULT_PAYLOAD: &str = "4607004345302";

/// Camera stand-in with a fixed native resolution.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    payload: String,
    warmup_frames: u32,
    warmup_left: u32,
    acquired: bool,
}

impl SyntheticCamera {
    /// Simulated device with the given native resolution.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            payload: DEFAULT_PAYLOAD.to_string(),
            warmup_frames: 0,
            warmup_left: 0,
            acquired: false,
        }
    }

    /// Barcode payload rendered into every live frame.
    pub fn with_payload(mut self, code: impl Into<String>) -> Self {
        self.payload = code.into();
        self
    }

    /// Number of empty frames served after acquisition, modelling sensor
    /// warm-up.
    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    fn render_frame(&self) -> Frame {
        let width = self.width as usize;
        let height = self.height as usize;
        let bar_row = ean13::render_row(&self.payload, width);
        let band = self.height * 2 / 5..self.height * 3 / 5;

        let mut rng = rand::thread_rng();
        let mut pixels = vec![0u8; width * height];
        for y in 0..height {
            let row = &mut pixels[y * width..(y + 1) * width];
            match &bar_row {
                Some(bar) if band.contains(&(y as u32)) => row.copy_from_slice(bar),
                _ => {
                    // Low-contrast sensor noise; never decodable on its own.
                    for px in row.iter_mut() {
                        *px = rng.gen_range(200..=255);
                    }
                }
            }
        }
        Frame::new(self.width, self.height, pixels)
    }
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    async fn acquire(&mut self, request: &CaptureRequest) -> Result<DeviceHandle, AcquireError> {
        if self.width < request.min_width {
            return Err(AcquireError::Unsupported);
        }
        debug!(
            facing = %request.facing,
            width = self.width,
            height = self.height,
            "synthetic camera acquired"
        );
        self.acquired = true;
        self.warmup_left = self.warmup_frames;
        Ok(DeviceHandle {
            label: "synthetic-0".to_string(),
            width: self.width,
            height: self.height,
        })
    }

    fn current_frame(&mut self) -> Frame {
        if !self.acquired {
            return Frame::empty();
        }
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            return Frame::empty();
        }
        self.render_frame()
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodeEngine, Ean13Engine};
    use crate::source::CameraFacing;

    fn request(min_width: u32) -> CaptureRequest {
        CaptureRequest {
            facing: CameraFacing::Environment,
            min_width,
        }
    }

    #[tokio::test]
    async fn warms_up_before_serving_live_frames() {
        let mut camera = SyntheticCamera::new(640, 480).with_warmup_frames(2);
        camera.acquire(&request(640)).await.unwrap();

        assert!(camera.current_frame().is_empty());
        assert!(camera.current_frame().is_empty());
        let frame = camera.current_frame();
        assert!(!frame.is_empty());
        assert!(frame.is_well_formed());
    }

    #[tokio::test]
    async fn rejects_requests_wider_than_the_sensor() {
        let mut camera = SyntheticCamera::new(640, 480);
        let err = camera.acquire(&request(1920)).await.unwrap_err();
        assert_eq!(err, AcquireError::Unsupported);
        assert!(camera.current_frame().is_empty());
    }

    #[tokio::test]
    async fn release_stops_the_stream() {
        let mut camera = SyntheticCamera::new(640, 480);
        camera.acquire(&request(640)).await.unwrap();
        assert!(!camera.current_frame().is_empty());

        camera.release();
        camera.release();
        assert!(camera.current_frame().is_empty());
    }

    #[tokio::test]
    async fn rendered_frames_carry_a_decodable_symbol() {
        let mut camera = SyntheticCamera::new(640, 480).with_payload("4607004345302");
        camera.acquire(&request(640)).await.unwrap();

        let symbols = Ean13Engine::new().decode(&camera.current_frame());
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload_text(), "4607004345302");
    }
}
