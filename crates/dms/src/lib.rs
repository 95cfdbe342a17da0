//! Driver Monitoring System (DMS)
//!
//! Drowsiness analysis over facial landmarks:
//! - Eye aspect ratio (EAR) per eye and averaged
//! - Frame-to-frame facial movement
//! - Alertness classification (active / tension / sleeping)
//! - Eyes-closed episode tracking with one-shot warning and alarm
//!
//! The landmark model itself sits behind [`LandmarkDetector`].

pub mod analysis;
pub mod config;
pub mod detector;
pub mod episode;
pub mod geometry;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod state;

pub use analysis::{analyze_face, FrameAnalysis};
pub use config::{DmsConfig, LostFacePolicy};
pub use detector::{Face, FaceBbox, FaceScript, LandmarkDetector, ScriptStep, SyntheticFaceDetector};
pub use episode::{AlarmCause, EpisodeEvent, EpisodePhase, EpisodeTracker, EpisodeUpdate};
pub use geometry::{EyeIndices, Keypoint};
#[cfg(feature = "onnx")]
pub use onnx::{InputLayout, OnnxFaceMesh};
pub use state::{classify, DriverState, StateThresholds};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Keypoints missing for feature calculation")]
    KeypointsMissing,
}
