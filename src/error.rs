//! Custom error types for the scanning pipeline.
//!
//! This module defines the primary error type, `ScanError`, for the whole
//! crate. Using the `thiserror` crate, it consolidates the failure modes of
//! the pipeline into one enum:
//!
//! - **`Acquire`**: device acquisition failures reported by a frame source
//!   (permission denied, unsupported device, driver failure). The lifecycle
//!   controller turns these into terminal session states.
//! - **`Config`**: file or environment configuration problems, including
//!   semantic validation failures caught after parsing.
//! - **`Io`**: standard `std::io::Error`, mostly from spawning the decode
//!   worker thread.
//! - **`DecoderBusy` / `DecoderGone` / `DimensionMismatch`**: decoder
//!   worker boundary violations. These indicate caller bugs or a dead
//!   worker, never a frame that merely failed to decode (an undecodable
//!   frame yields an empty result, not an error).
//! - **`Task`**: the scan task ended abnormally, observed while joining it
//!   during teardown.
//! - **`ShutdownFailed`**: aggregation of errors encountered during
//!   best-effort teardown, which continues past individual failures.
//!
//! By using `#[from]`, `ScanError` can be seamlessly created from the
//! underlying error types with the `?` operator.

use thiserror::Error;

use crate::config::ConfigError;
use crate::source::AcquireError;

/// Convenience alias for results using the pipeline error type.
pub type AppResult<T> = std::result::Result<T, ScanError>;

/// Unified error type for the scanning pipeline.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Device acquisition failed; carried into a terminal lifecycle state.
    #[error("Device acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A submit was attempted while a request was still outstanding.
    #[error("Decoder is busy with an outstanding request")]
    DecoderBusy,

    /// The decoder worker has terminated and can accept no more work.
    #[error("Decoder worker is no longer running")]
    DecoderGone,

    /// A frame did not match the dimensions the decoder was built for.
    #[error("Frame is {actual_width}x{actual_height} but decoder expects {expected_width}x{expected_height}")]
    DimensionMismatch {
        /// Width the decoder was constructed with.
        expected_width: u32,
        /// Height the decoder was constructed with.
        expected_height: u32,
        /// Width of the rejected frame.
        actual_width: u32,
        /// Height of the rejected frame.
        actual_height: u32,
    },

    /// The scan task ended abnormally, usually by panicking.
    #[error("Scan task failed: {0}")]
    Task(String),

    /// Teardown completed but one or more cleanup steps reported errors.
    #[error("Shutdown finished with errors")]
    ShutdownFailed(Vec<ScanError>),
}
