//! Frame sources sampled by the detection loop

use crate::{CameraConfig, CameraError, VideoFrame};
use std::time::Instant;
use tracing::{debug, info};

/// A camera (or anything that behaves like one) the monitor samples from.
///
/// `open` is the only fallible step; once streaming, a source reports
/// readiness instead of failing so the loop can simply skip a frame.
pub trait FrameSource: Send {
    /// Acquire the device and start streaming
    fn open(&mut self) -> Result<(), CameraError>;

    /// Whether a complete frame is available right now
    fn is_ready(&self) -> bool;

    /// Latest frame, if the source is ready
    fn current_frame(&mut self) -> Option<VideoFrame>;

    /// Stop streaming and release the device. Safe to call repeatedly.
    fn release(&mut self);
}

/// Blank-frame generator standing in for the cabin camera
pub struct SyntheticSource {
    config: CameraConfig,
    opened_at: Option<Instant>,
    sequence: u32,
    deny_open: bool,
}

impl SyntheticSource {
    /// Create a synthetic source with the given frame geometry
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            opened_at: None,
            sequence: 0,
            deny_open: false,
        }
    }

    /// A source whose `open` fails as if camera access had been refused
    pub fn denied(config: CameraConfig) -> Self {
        Self {
            deny_open: true,
            ..Self::new(config)
        }
    }

    /// Number of frames handed out since the last open
    pub fn frames_served(&self) -> u32 {
        self.sequence
    }

    /// Whether the source is currently streaming
    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(CameraConfig::cabin())
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.deny_open {
            return Err(CameraError::PermissionDenied);
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(CameraError::Open(format!(
                "invalid geometry {}x{}",
                self.config.width, self.config.height
            )));
        }
        info!(
            "Synthetic camera {} streaming {}x{} @ {}fps",
            self.config.device, self.config.width, self.config.height, self.config.fps
        );
        self.opened_at = Some(Instant::now());
        self.sequence = 0;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.opened_at.is_some()
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        let opened_at = self.opened_at?;
        let timestamp_ns = opened_at.elapsed().as_nanos() as u64;
        let frame = VideoFrame::blank(
            self.config.width,
            self.config.height,
            timestamp_ns,
            self.sequence,
        );
        self.sequence = self.sequence.wrapping_add(1);
        Some(frame)
    }

    fn release(&mut self) {
        if self.opened_at.take().is_some() {
            debug!("Synthetic camera {} released", self.config.device);
        }
    }
}
