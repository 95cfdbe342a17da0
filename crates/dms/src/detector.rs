//! Landmark detection seam and a scripted face-mesh stand-in

use crate::geometry::{EyeIndices, Keypoint};
use crate::DmsError;
use async_trait::async_trait;
use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Face bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBbox {
    /// Smallest box containing every keypoint
    pub fn enclosing(keypoints: &[Keypoint]) -> Option<Self> {
        let first = keypoints.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in keypoints {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

/// One detected face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    /// Landmarks in the detector's fixed topology
    pub keypoints: Vec<Keypoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<FaceBbox>,
    pub confidence: f32,
}

/// Produces facial landmarks for a frame.
///
/// Implementations are black boxes to the monitor: any model that emits
/// a topology the configured eye indices fit can be swapped in.
#[async_trait]
pub trait LandmarkDetector: Send {
    /// Load weights or warm up. A failure here prevents the session from starting.
    async fn load(&mut self) -> Result<(), DmsError> {
        Ok(())
    }

    /// Whether `estimate_faces` can be called
    fn is_ready(&self) -> bool;

    /// Detect faces in a frame, most prominent first
    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<Face>, DmsError>;
}

/// Number of points in the synthetic mesh
pub const SYNTHETIC_MESH_POINTS: usize = 468;

/// Width of each synthetic eye (pixels)
const SYNTHETIC_EYE_WIDTH: f32 = 30.0;

/// One stretch of a scripted detection sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptStep {
    /// A face whose eyes have the given EAR, optionally drifting
    /// horizontally by `shift` pixels per detection
    Face {
        frames: usize,
        ear: f32,
        #[serde(default)]
        shift: f32,
    },
    /// Nothing in view
    NoFace { frames: usize },
    /// The detector errors out
    Failure { frames: usize },
}

impl ScriptStep {
    fn frames(&self) -> usize {
        match *self {
            ScriptStep::Face { frames, .. }
            | ScriptStep::NoFace { frames }
            | ScriptStep::Failure { frames } => frames,
        }
    }
}

/// Sequence of detections replayed by `SyntheticFaceDetector`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceScript {
    steps: Vec<ScriptStep>,
}

impl FaceScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Still face with the given EAR
    pub fn face(mut self, frames: usize, ear: f32) -> Self {
        self.steps.push(ScriptStep::Face { frames, ear, shift: 0.0 });
        self
    }

    /// Face drifting `shift` pixels per detection
    pub fn moving(mut self, frames: usize, ear: f32, shift: f32) -> Self {
        self.steps.push(ScriptStep::Face { frames, ear, shift });
        self
    }

    pub fn no_face(mut self, frames: usize) -> Self {
        self.steps.push(ScriptStep::NoFace { frames });
        self
    }

    pub fn failing(mut self, frames: usize) -> Self {
        self.steps.push(ScriptStep::Failure { frames });
        self
    }

    /// Total detections scripted
    pub fn len(&self) -> usize {
        self.steps.iter().map(ScriptStep::frames).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Step governing the `index`-th detection
    pub fn step_at(&self, index: usize) -> Option<&ScriptStep> {
        let mut remaining = index;
        for step in &self.steps {
            if remaining < step.frames() {
                return Some(step);
            }
            remaining -= step.frames();
        }
        None
    }

    pub fn from_json(json: &str) -> Result<Self, DmsError> {
        serde_json::from_str(json).map_err(|e| DmsError::Config(format!("invalid face script: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DmsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DmsError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

/// Replays a `FaceScript` as a 468-point face mesh.
///
/// Each call to `estimate_faces` consumes one scripted detection; once
/// the script runs out no face is reported.
pub struct SyntheticFaceDetector {
    script: FaceScript,
    left_eye: EyeIndices,
    right_eye: EyeIndices,
    calls: usize,
    offset_x: f32,
    loaded: bool,
    unavailable: bool,
}

impl SyntheticFaceDetector {
    pub fn new(script: FaceScript) -> Self {
        Self {
            script,
            left_eye: EyeIndices::FACE_MESH_LEFT,
            right_eye: EyeIndices::FACE_MESH_RIGHT,
            calls: 0,
            offset_x: 0.0,
            loaded: false,
            unavailable: false,
        }
    }

    /// A detector whose model never loads
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(FaceScript::new())
        }
    }

    /// Place the eyes at custom mesh indices
    pub fn with_eyes(mut self, left: EyeIndices, right: EyeIndices) -> Self {
        if left.max_index().max(right.max_index()) >= SYNTHETIC_MESH_POINTS {
            warn!("Eye indices exceed the {}-point synthetic mesh", SYNTHETIC_MESH_POINTS);
        }
        self.left_eye = left;
        self.right_eye = right;
        self
    }

    /// Detections served so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn is_exhausted(&self) -> bool {
        self.calls >= self.script.len()
    }

    fn mesh(&self, frame: &VideoFrame, ear: f32) -> Vec<Keypoint> {
        let cx = frame.width as f32 / 2.0 + self.offset_x;
        let cy = frame.height as f32 / 2.0;
        let radius = frame.height.min(frame.width) as f32 * 0.25;

        // Sunflower layout: a stable, evenly spread point cloud
        let golden_angle = std::f32::consts::PI * (3.0 - 5f32.sqrt());
        let mut points: Vec<Keypoint> = (0..SYNTHETIC_MESH_POINTS)
            .map(|i| {
                let r = radius * ((i as f32 + 0.5) / SYNTHETIC_MESH_POINTS as f32).sqrt();
                let theta = i as f32 * golden_angle;
                Keypoint::new(cx + r * theta.cos(), cy + r * theta.sin())
            })
            .collect();

        let eye_y = cy - radius * 0.25;
        place_eye(&mut points, &self.right_eye, cx - radius * 0.35, eye_y, ear);
        place_eye(&mut points, &self.left_eye, cx + radius * 0.35, eye_y, ear);
        points
    }
}

/// Write an eye with exactly the requested EAR into the mesh
fn place_eye(points: &mut [Keypoint], eye: &EyeIndices, cx: f32, cy: f32, ear: f32) {
    let w = SYNTHETIC_EYE_WIDTH;
    let h = ear.max(0.0) * w;
    let layout = [
        Keypoint::new(cx - w / 2.0, cy),
        Keypoint::new(cx - w / 6.0, cy - h / 2.0),
        Keypoint::new(cx + w / 6.0, cy - h / 2.0),
        Keypoint::new(cx + w / 2.0, cy),
        Keypoint::new(cx + w / 6.0, cy + h / 2.0),
        Keypoint::new(cx - w / 6.0, cy + h / 2.0),
    ];
    for (&idx, point) in eye.0.iter().zip(layout) {
        if let Some(slot) = points.get_mut(idx) {
            *slot = point;
        }
    }
}

#[async_trait]
impl LandmarkDetector for SyntheticFaceDetector {
    async fn load(&mut self) -> Result<(), DmsError> {
        if self.unavailable {
            return Err(DmsError::ModelLoad("synthetic detector marked unavailable".into()));
        }
        info!(
            "Synthetic face mesh ready ({} scripted detections)",
            self.script.len()
        );
        self.loaded = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.loaded
    }

    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<Face>, DmsError> {
        let step = self.script.step_at(self.calls).copied();
        self.calls += 1;

        match step {
            Some(ScriptStep::Face { ear, shift, .. }) => {
                self.offset_x += shift;
                let keypoints = self.mesh(frame, ear);
                Ok(vec![Face {
                    bbox: FaceBbox::enclosing(&keypoints),
                    keypoints,
                    confidence: 0.95,
                }])
            }
            Some(ScriptStep::NoFace { .. }) => Ok(vec![]),
            Some(ScriptStep::Failure { .. }) => {
                Err(DmsError::Inference(format!("scripted failure at detection {}", self.calls)))
            }
            None => {
                debug!("Face script exhausted after {} detections", self.script.len());
                Ok(vec![])
            }
        }
    }
}
