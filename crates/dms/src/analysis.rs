//! Per-frame analysis: EAR, movement and alertness state for one face

use crate::config::DmsConfig;
use crate::detector::Face;
use crate::geometry::{average_ear, eye_aspect_ratio, eye_points, movement, Keypoint};
use crate::state::{classify, DriverState};
use crate::DmsError;
use serde::{Deserialize, Serialize};

/// Everything derived from a single detected face
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub left_ear: f32,
    pub right_ear: f32,
    /// Mean of both eyes
    pub ear: f32,
    /// Mean keypoint displacement since the previous face
    pub movement: f32,
    pub state: DriverState,
    /// `ear` is under the closed-eye threshold
    pub eyes_closed: bool,
}

/// Run the geometry and classification steps over one face
pub fn analyze_face(
    face: &Face,
    previous: Option<&[Keypoint]>,
    config: &DmsConfig,
) -> Result<FrameAnalysis, DmsError> {
    let left_ear = eye_aspect_ratio(&eye_points(&face.keypoints, &config.left_eye)?);
    let right_ear = eye_aspect_ratio(&eye_points(&face.keypoints, &config.right_eye)?);
    let ear = average_ear(left_ear, right_ear);
    let movement = movement(&face.keypoints, previous);
    let state = classify(ear, movement, &config.state_thresholds());

    Ok(FrameAnalysis {
        left_ear,
        right_ear,
        ear,
        movement,
        state,
        eyes_closed: ear < config.ear_closed_threshold,
    })
}
