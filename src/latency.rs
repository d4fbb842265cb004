//! Rolling round-trip latency estimator.
//!
//! Each completed capture/decode round trip contributes one sample to a
//! fixed-capacity FIFO window; the window mean is the metric published to
//! status subscribers. The window never grows past its capacity: once full,
//! every push evicts the oldest sample.

use std::collections::VecDeque;

/// Default number of samples held by the window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Fixed-capacity FIFO window of round-trip times in milliseconds.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    /// Creates a window holding at most `capacity` samples (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records one round-trip sample, evicting the oldest when full.
    pub fn push(&mut self, sample_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    /// Mean over the currently held samples, 0.0 when none recorded yet.
    #[must_use]
    pub fn mean_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first sample arrives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured maximum sample count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_reports_zero() {
        let window = LatencyWindow::default();
        assert!(window.is_empty());
        assert_eq!(window.mean_ms(), 0.0);
    }

    #[test]
    fn mean_tracks_each_push() {
        let mut window = LatencyWindow::new(10);
        window.push(10.0);
        assert_eq!(window.mean_ms(), 10.0);
        window.push(20.0);
        assert_eq!(window.mean_ms(), 15.0);
        window.push(30.0);
        assert_eq!(window.mean_ms(), 20.0);
    }

    #[test]
    fn holds_exactly_capacity_after_fill() {
        let mut window = LatencyWindow::new(10);
        for i in 0..25 {
            window.push(i as f64);
            assert!(window.len() <= 10);
        }
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut window = LatencyWindow::new(10);
        for i in 0..10 {
            window.push(i as f64);
        }
        // Samples 0..=9, mean 4.5.
        assert_eq!(window.mean_ms(), 4.5);
        window.push(100.0);
        // Sample 0 evicted; 1..=9 plus 100 is 145 over 10.
        assert_eq!(window.mean_ms(), 14.5);
    }

    #[test]
    fn capacity_is_clamped_to_one() {
        let mut window = LatencyWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(5.0);
        window.push(7.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.mean_ms(), 7.0);
    }
}
