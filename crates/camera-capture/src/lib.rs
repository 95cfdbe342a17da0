//! Camera Capture Library for Driver Monitoring
//!
//! Provides the video frame type and the frame-source seam the
//! drowsiness monitor samples from:
//! - `VideoFrame`: decoded RGB frame with capture metadata
//! - `FrameSource`: a camera (or stand-in) that can be opened, polled
//!   for readiness, sampled and released
//! - `SyntheticSource`: a blank-frame generator for tests and demos

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, SyntheticSource};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::cabin()
    }
}

impl CameraConfig {
    /// Cabin-facing camera used for driver monitoring
    pub fn cabin() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}
