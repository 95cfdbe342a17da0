//! Landmark geometry: eye aspect ratio and frame-to-frame movement

use crate::DmsError;
use serde::{Deserialize, Serialize};

/// Horizontal eye widths below this are treated as a degenerate detection
const MIN_EYE_WIDTH: f32 = 1e-6;

/// A tracked facial keypoint in frame pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Depth estimate, if the detector provides one. Ignored here.
    #[serde(default)]
    pub z: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance to another keypoint
    pub fn distance(&self, other: &Keypoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }
}

/// Six landmark indices describing one eye, in p1..p6 order.
///
/// p1/p4 are the horizontal corners; (p2, p6) and (p3, p5) are the
/// vertical eyelid pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeIndices(pub [usize; 6]);

impl EyeIndices {
    /// Driver's left eye in the 468-point face mesh
    pub const FACE_MESH_LEFT: EyeIndices = EyeIndices([362, 385, 387, 263, 373, 380]);
    /// Driver's right eye in the 468-point face mesh
    pub const FACE_MESH_RIGHT: EyeIndices = EyeIndices([33, 160, 158, 133, 153, 144]);

    /// Largest index referenced
    pub fn max_index(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

/// Pick an eye's six points out of a full landmark set
pub fn eye_points(keypoints: &[Keypoint], eye: &EyeIndices) -> Result<[Keypoint; 6], DmsError> {
    let mut points = [Keypoint::default(); 6];
    for (slot, &idx) in points.iter_mut().zip(eye.0.iter()) {
        *slot = *keypoints.get(idx).ok_or(DmsError::KeypointsMissing)?;
    }
    Ok(points)
}

/// Eye aspect ratio: `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`.
///
/// Returns `0.0` when the eye corners coincide, so a degenerate
/// detection reads as a closed eye rather than a division by zero.
pub fn eye_aspect_ratio(points: &[Keypoint; 6]) -> f32 {
    let [p1, p2, p3, p4, p5, p6] = points;
    let horizontal = p1.distance(p4);
    if horizontal < MIN_EYE_WIDTH {
        return 0.0;
    }
    (p2.distance(p6) + p3.distance(p5)) / (2.0 * horizontal)
}

/// Session-level EAR for a frame
pub fn average_ear(left: f32, right: f32) -> f32 {
    (left + right) / 2.0
}

/// Mean per-point displacement between two landmark sets.
///
/// Only indices present in both sets are compared. Returns `0.0` when
/// there is no previous frame or nothing to compare.
pub fn movement(current: &[Keypoint], previous: Option<&[Keypoint]>) -> f32 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let n = current.len().min(previous.len());
    if n == 0 {
        return 0.0;
    }
    let total: f32 = current
        .iter()
        .zip(previous.iter())
        .map(|(a, b)| a.distance(b))
        .sum();
    total / n as f32
}
