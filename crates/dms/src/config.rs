//! DMS configuration

use crate::geometry::EyeIndices;
use crate::state::StateThresholds;
use crate::DmsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest warning or alarm delay accepted (seconds)
const MAX_ESCALATION_SEC: f64 = 3600.0;

/// What happens to an open eyes-closed episode while no face is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LostFacePolicy {
    /// Leave the episode untouched; its start time is kept
    #[default]
    Freeze,
    /// End the episode as if the eyes had opened
    Reset,
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Minimum time between detector invocations (milliseconds)
    pub detection_interval_ms: u64,

    /// EAR below this means eyes closed
    pub ear_closed_threshold: f32,

    /// EAR below this classifies the driver as sleeping
    pub ear_sleeping_threshold: f32,

    /// Mean keypoint displacement (pixels) that classifies as tension
    pub tension_movement_threshold: f32,

    /// Continuous closure before the warning fires (seconds)
    pub warning_duration_sec: f64,

    /// Continuous closure before the alarm fires (seconds)
    pub alarm_duration_sec: f64,

    /// Landmark indices for each eye
    pub left_eye: EyeIndices,
    pub right_eye: EyeIndices,

    /// Episode handling while the face is lost
    pub lost_face_policy: LostFacePolicy,

    /// Emit the per-frame debug line every N detections
    pub log_every_n_frames: u64,

    /// Face-mesh model path (used with the `onnx` feature)
    pub face_model_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 100,
            ear_closed_threshold: 0.21,
            ear_sleeping_threshold: 0.12,
            tension_movement_threshold: 3.0,
            warning_duration_sec: 3.0,
            alarm_duration_sec: 5.0,
            left_eye: EyeIndices::FACE_MESH_LEFT,
            right_eye: EyeIndices::FACE_MESH_RIGHT,
            lost_face_policy: LostFacePolicy::Freeze,
            log_every_n_frames: 10,
            face_model_path: None,
        }
    }
}

impl DmsConfig {
    /// Create strict config (eyes count as closed sooner, faster escalation)
    pub fn strict() -> Self {
        Self {
            ear_closed_threshold: 0.23,
            warning_duration_sec: 2.0,
            alarm_duration_sec: 3.5,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerates narrower eyes, slower escalation)
    pub fn lenient() -> Self {
        Self {
            ear_closed_threshold: 0.18,
            ear_sleeping_threshold: 0.10,
            warning_duration_sec: 4.0,
            alarm_duration_sec: 7.0,
            ..Default::default()
        }
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<(), DmsError> {
        if self.detection_interval_ms == 0 {
            return Err(DmsError::Config("detection_interval_ms must be positive".into()));
        }
        if !(self.ear_closed_threshold > 0.0) || !(self.ear_sleeping_threshold > 0.0) {
            return Err(DmsError::Config("EAR thresholds must be positive".into()));
        }
        if self.ear_sleeping_threshold > self.ear_closed_threshold {
            return Err(DmsError::Config(format!(
                "ear_sleeping_threshold {} exceeds ear_closed_threshold {}",
                self.ear_sleeping_threshold, self.ear_closed_threshold
            )));
        }
        if !(self.tension_movement_threshold > 0.0) {
            return Err(DmsError::Config("tension_movement_threshold must be positive".into()));
        }
        if !(self.warning_duration_sec > 0.0) || !self.warning_duration_sec.is_finite() {
            return Err(DmsError::Config("warning_duration_sec must be positive".into()));
        }
        if !(self.alarm_duration_sec > self.warning_duration_sec) || !self.alarm_duration_sec.is_finite() {
            return Err(DmsError::Config(format!(
                "alarm_duration_sec {} must exceed warning_duration_sec {}",
                self.alarm_duration_sec, self.warning_duration_sec
            )));
        }
        if self.alarm_duration_sec > MAX_ESCALATION_SEC {
            return Err(DmsError::Config(format!(
                "alarm_duration_sec {} exceeds {}s",
                self.alarm_duration_sec, MAX_ESCALATION_SEC
            )));
        }
        if self.log_every_n_frames == 0 {
            return Err(DmsError::Config("log_every_n_frames must be at least 1".into()));
        }
        Ok(())
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn warning_duration(&self) -> Duration {
        Duration::from_secs_f64(self.warning_duration_sec)
    }

    pub fn alarm_duration(&self) -> Duration {
        Duration::from_secs_f64(self.alarm_duration_sec)
    }

    pub fn state_thresholds(&self) -> StateThresholds {
        StateThresholds {
            ear_closed: self.ear_closed_threshold,
            ear_sleeping: self.ear_sleeping_threshold,
            tension_movement: self.tension_movement_threshold,
        }
    }
}
