//! Core library for the barscan application.
//!
//! This library contains the capture/decode pipeline: frame sources, the
//! EAN-13 decode worker, the periodic scan scheduler and the session
//! lifecycle controller. It is used by the demo binary and by the
//! integration tests.
//!
//! ```
//! use barscan::source::mock::MockFrameSource;
//! use barscan::source::{CaptureRequest, FrameSource};
//!
//! let mut source = MockFrameSource::granting(640, 480);
//! let device = tokio_test::block_on(source.acquire(&CaptureRequest::default())).unwrap();
//! assert_eq!((device.width, device.height), (640, 480));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod latency;
pub mod scheduler;
pub mod session;
pub mod source;
