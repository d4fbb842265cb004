//! Scanner configuration using Figment.
//!
//! This module provides strongly-typed configuration loading for the
//! scanning pipeline. Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables (prefixed with `BARSCAN_`)
//!
//! # Environment Variable Overrides
//!
//! Environment variables with the `BARSCAN_` prefix can override
//! configuration values:
//!
//! ```text
//! BARSCAN_CAPTURE_FACING=user
//! BARSCAN_APPLICATION_NAME="Shelf Scanner"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use barscan::config::ScannerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ScannerConfig::load()?;
//!     println!("Application: {}", config.application.name);
//!     println!("Scan interval: {}ms", config.scan.interval_ms);
//!     Ok(())
//! }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment providers could not be merged or parsed.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// A value parsed but is semantically invalid.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level scanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Capture device settings
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Scan cycle settings
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Capture device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Preferred camera facing (environment, user, any)
    #[serde(default = "default_facing")]
    pub facing: String,
    /// Minimum acceptable frame width in pixels
    #[serde(default = "default_min_width")]
    pub min_width: u32,
}

/// Scan cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Capture/decode cycle period in milliseconds
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Number of round-trip samples in the latency window
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    /// Decode watchdog deadline in milliseconds (0 disables the watchdog)
    #[serde(default = "default_decode_timeout")]
    pub decode_timeout_ms: u64,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "barscan".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_facing() -> String {
    "environment".to_string()
}

fn default_min_width() -> u32 {
    1920
}

fn default_interval() -> u64 {
    200
}

fn default_latency_window() -> usize {
    crate::latency::DEFAULT_WINDOW_CAPACITY
}

fn default_decode_timeout() -> u64 {
    2000
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: default_facing(),
            min_width: default_min_width(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            latency_window: default_latency_window(),
            decode_timeout_ms: default_decode_timeout(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ScannerConfig {
    /// Load configuration from `config/barscan.toml` and environment variables
    ///
    /// Configuration is loaded in this order of precedence (highest to lowest):
    /// 1. Environment variables (`BARSCAN_` prefix)
    /// 2. `config/barscan.toml` file
    ///
    /// A missing file is not an error; defaults apply. After loading,
    /// configuration is validated.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the providers cannot be merged or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/barscan.toml")
    }

    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be parsed or validation
    /// fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BARSCAN_").split("_"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Camera facing is valid (environment, user, any)
    /// - Minimum width is nonzero
    /// - Scan interval and latency window are nonzero
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` with a descriptive message for any
    /// validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_facings = ["environment", "user", "any"];
        if !valid_facings.contains(&self.capture.facing.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid capture facing '{}'. Must be one of: {}",
                self.capture.facing,
                valid_facings.join(", ")
            )));
        }

        if self.capture.min_width == 0 {
            return Err(ConfigError::ValidationError(
                "capture.min_width must be > 0".to_string(),
            ));
        }

        if self.scan.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scan.interval_ms must be > 0".to_string(),
            ));
        }

        if self.scan.latency_window == 0 {
            return Err(ConfigError::ValidationError(
                "scan.latency_window must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ScanConfig {
    /// Cycle period as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Watchdog deadline as a `Duration`, `None` when disabled.
    pub fn decode_timeout(&self) -> Option<Duration> {
        if self.decode_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.decode_timeout_ms))
        }
    }
}
