//! Face-mesh landmark model via ONNX Runtime

use crate::detector::{Face, FaceBbox, LandmarkDetector};
use crate::geometry::Keypoint;
use crate::DmsError;
use async_trait::async_trait;
use camera_capture::VideoFrame;
use image::RgbImage;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{error, info};

/// Square input resolution the face-mesh model expects
const INPUT_SIZE: u32 = 192;

/// Landmarks produced per face
const MESH_POINTS: usize = 468;

/// Memory layout of the model's image input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    /// `1x192x192x3`, as in the usual face-mesh exports
    #[default]
    Nhwc,
    /// `1x3x192x192`
    Nchw,
}

/// Face-mesh detector. Treats the whole frame as the face crop; the
/// model's face-presence score decides whether a face is reported.
///
/// Expects one `f32` RGB image input scaled to 0..1, in NHWC layout
/// unless [`InputLayout::Nchw`] is selected, and two outputs:
/// 468 x (x, y, z) landmarks in input pixels, then a presence logit.
pub struct OnnxFaceMesh {
    model_path: String,
    presence_threshold: f32,
    layout: InputLayout,
    session: Option<Session>,
}

impl OnnxFaceMesh {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            presence_threshold: 0.5,
            layout: InputLayout::default(),
            session: None,
        }
    }

    pub fn with_presence_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }

    pub fn with_layout(mut self, layout: InputLayout) -> Self {
        self.layout = layout;
        self
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, DmsError> {
        let img = frame
            .to_rgb_image()
            .map_err(|e| DmsError::ImageProcessing(e.to_string()))?;
        let resized = image::imageops::resize(
            &img,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );
        Ok(input_tensor(&resized, self.layout))
    }
}

/// Pack an RGB image into a 1-batch tensor scaled to 0..1
fn input_tensor(img: &RgbImage, layout: InputLayout) -> Array4<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut input = match layout {
        InputLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
        InputLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
    };
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match layout {
                InputLayout::Nhwc => input[[0, y, x, c]] = value,
                InputLayout::Nchw => input[[0, c, y, x]] = value,
            }
        }
    }
    input
}

fn presence_score(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Decode flat (x, y, z) triples in input pixels into frame-space keypoints
fn decode_landmarks(raw: &[f32], frame_width: u32, frame_height: u32) -> Result<Vec<Keypoint>, DmsError> {
    if raw.len() < MESH_POINTS * 3 {
        return Err(DmsError::KeypointsMissing);
    }
    let sx = frame_width as f32 / INPUT_SIZE as f32;
    let sy = frame_height as f32 / INPUT_SIZE as f32;
    Ok(raw
        .chunks_exact(3)
        .take(MESH_POINTS)
        .map(|p| Keypoint {
            x: p[0] * sx,
            y: p[1] * sy,
            z: p[2],
        })
        .collect())
}

#[async_trait]
impl LandmarkDetector for OnnxFaceMesh {
    async fn load(&mut self) -> Result<(), DmsError> {
        info!("Loading face mesh model from {}", self.model_path);
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(&self.model_path))
            .map_err(|e| {
                error!("Failed to load face mesh model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;
        self.session = Some(session);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    async fn estimate_faces(&mut self, frame: &VideoFrame) -> Result<Vec<Face>, DmsError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| DmsError::ModelLoad("face mesh model not loaded".into()))?;
        let input = self.preprocess(frame)?;

        let outputs = session
            .run(ort::inputs![input.view()].map_err(|e| DmsError::Inference(e.to_string()))?)
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        // Output 0: 468 x (x, y, z) in input pixels. Output 1: presence logit.
        let landmarks = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let presence = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let score = presence.iter().next().copied().map(presence_score).unwrap_or(0.0);
        if score < self.presence_threshold {
            return Ok(vec![]);
        }

        let raw: Vec<f32> = landmarks.iter().copied().collect();
        let keypoints = decode_landmarks(&raw, frame.width, frame.height)?;

        Ok(vec![Face {
            bbox: FaceBbox::enclosing(&keypoints),
            keypoints,
            confidence: score,
        }])
    }
}
