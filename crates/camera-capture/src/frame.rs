//! Video frame types and processing

use crate::CameraError;
use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Black frame of the given size
    pub fn blank(width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Whether the frame carries pixels a detector can work on
    pub fn has_data(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy the pixels into an `image` buffer for preprocessing
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| CameraError::Format("frame buffer does not match dimensions".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let result = VideoFrame::new(vec![0; 10], 4, 4, 0, 0);
        assert!(matches!(result, Err(CameraError::Format(_))));
    }

    #[test]
    fn test_blank_frame_pixels() {
        let frame = VideoFrame::blank(8, 6, 42, 3);
        assert!(frame.has_data());
        assert_eq!(frame.get_pixel(7, 5), Some([0, 0, 0]));
        assert_eq!(frame.get_pixel(8, 0), None);
        assert_eq!(frame.sequence, 3);
    }

    #[test]
    fn test_rgb_image_conversion() {
        let mut data = vec![0; 2 * 2 * 3];
        data[3] = 255;
        let frame = VideoFrame::new(data, 2, 2, 0, 0).unwrap();
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0]);
    }
}
