//! Captured image snapshots.
//!
//! A [`Frame`] is an immutable 8-bit grayscale snapshot taken from the live
//! device buffer. Frames are owned transiently by the capture cycle that
//! produced them: each one is moved into a decode request and dropped after
//! the decoder has consumed it, so no frame is ever retained across ticks.

use chrono::{DateTime, Utc};

/// One captured grayscale image snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major 8-bit luminance data, `width * height` bytes when well formed.
    pub pixels: Vec<u8>,
    /// Capture timestamp.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Creates a frame from raw luminance data.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// Creates the zero-sized frame a device serves before warm-up completes.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    /// True when the frame carries no decodable data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// True when the buffer length agrees with the stated dimensions.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == (self.width as usize) * (self.height as usize)
    }

    /// Width and height as a pair.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Borrows one pixel row, or `None` when `y` is out of range or the
    /// frame is malformed.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height || !self.is_well_formed() {
            return None;
        }
        let start = (y as usize) * (self.width as usize);
        self.pixels.get(start..start + self.width as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_is_empty() {
        assert!(Frame::empty().is_empty());
        assert!(Frame::new(0, 4, vec![0; 0]).is_empty());
        assert!(Frame::new(4, 0, Vec::new()).is_empty());
    }

    #[test]
    fn well_formed_checks_buffer_length() {
        let good = Frame::new(4, 2, vec![0; 8]);
        assert!(good.is_well_formed());
        let bad = Frame::new(4, 2, vec![0; 7]);
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn row_access() {
        let mut pixels = vec![0u8; 12];
        pixels[4..8].copy_from_slice(&[1, 2, 3, 4]);
        let frame = Frame::new(4, 3, pixels);
        assert_eq!(frame.row(1), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(frame.row(3), None);
    }

    #[test]
    fn row_on_malformed_frame_is_none() {
        let frame = Frame::new(4, 3, vec![0; 5]);
        assert_eq!(frame.row(0), None);
    }
}
