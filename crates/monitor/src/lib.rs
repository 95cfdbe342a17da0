//! Drowsiness Monitor
//!
//! The real-time loop tying the pieces together: throttled frame
//! sampling, landmark detection, EAR/movement analysis, eyes-closed
//! escalation, alert delivery and the audible alarm.

mod controller;
mod runner;
#[cfg(test)]
mod scenarios;
mod settings;
mod snapshot;

pub use controller::{DrowsinessMonitor, FrameReport, SessionOptions, TickOutcome};
pub use runner::MonitorHandle;
pub use settings::{LoggingConfig, SessionConfig, Settings};
pub use snapshot::MonitorSnapshot;

use camera_capture::CameraError;
use dms::DmsError;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Monitor error types. Only session start-up and configuration
/// problems surface here; per-frame issues are absorbed by the loop.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Camera unavailable: {0}")]
    Camera(#[from] CameraError),

    #[error("Landmark detector unavailable: {0}")]
    Detector(#[source] DmsError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Monitor task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), MonitorError> {
    let level = Level::from_str(&config.level)
        .map_err(|_| MonitorError::Logging(format!("unknown log level '{}'", config.level)))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| MonitorError::Logging(e.to_string()))
}
