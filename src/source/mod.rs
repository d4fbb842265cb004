//! Capture device abstraction.
//!
//! A [`FrameSource`] owns the capture device handle and serves the latest
//! frame on demand; it is the only part of the pipeline that touches a
//! device. Everything downstream consumes plain [`Frame`] values.
//!
//! Two implementations ship with the crate: [`synthetic::SyntheticCamera`],
//! a simulated device that renders decodable frames, and
//! [`mock::MockFrameSource`], a fully scripted source for tests.

pub mod mock;
pub mod synthetic;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CaptureConfig;
use crate::frame::Frame;

/// Errors raised while acquiring the capture device.
///
/// Acquisition performs no retries; the lifecycle controller decides how
/// each failure is surfaced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The user or platform refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No device satisfies the requested capabilities.
    #[error("no capture device with the required capabilities")]
    Unsupported,
    /// The device exists but failed to start.
    #[error("capture device failure: {0}")]
    DeviceError(String),
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Rear camera, pointing away from the user.
    Environment,
    /// Front camera, pointing at the user.
    User,
    /// No preference.
    Any,
}

impl CameraFacing {
    /// Parses the configuration spelling of a facing.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "environment" => Some(Self::Environment),
            "user" => Some(Self::User),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::User => write!(f, "user"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Constraints passed to [`FrameSource::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Preferred camera facing.
    pub facing: CameraFacing,
    /// Minimum acceptable frame width in pixels.
    pub min_width: u32,
}

impl CaptureRequest {
    /// Builds a request from the validated capture configuration.
    pub fn from_config(capture: &CaptureConfig) -> Self {
        Self {
            facing: CameraFacing::parse(&capture.facing).unwrap_or(CameraFacing::Any),
            min_width: capture.min_width,
        }
    }
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            min_width: 1920,
        }
    }
}

/// Identity and negotiated geometry of an acquired device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Human-readable device label.
    pub label: String,
    /// Negotiated frame width in pixels.
    pub width: u32,
    /// Negotiated frame height in pixels.
    pub height: u32,
}

/// A capture device serving grayscale frame snapshots.
#[async_trait]
pub trait FrameSource: Send {
    /// Requests device access under the given constraints.
    ///
    /// Performs no retries. A failure here is final for the session; the
    /// caller maps it onto a terminal lifecycle state.
    async fn acquire(&mut self, request: &CaptureRequest) -> Result<DeviceHandle, AcquireError>;

    /// Snapshot of the live device buffer.
    ///
    /// Synchronous and non-blocking. Returns an empty frame while the
    /// device is still warming up or after release.
    fn current_frame(&mut self) -> Frame;

    /// Releases the device. Idempotent; repeated calls have no further
    /// side effects.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_parse_and_display_round_trip() {
        for facing in [CameraFacing::Environment, CameraFacing::User, CameraFacing::Any] {
            assert_eq!(CameraFacing::parse(&facing.to_string()), Some(facing));
        }
        assert_eq!(CameraFacing::parse("sideways"), None);
    }

    #[test]
    fn request_from_config_uses_validated_fields() {
        let capture = CaptureConfig {
            facing: "user".to_string(),
            min_width: 1280,
        };
        let request = CaptureRequest::from_config(&capture);
        assert_eq!(request.facing, CameraFacing::User);
        assert_eq!(request.min_width, 1280);
    }
}
