use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel formats accepted by the analysis pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Single-channel 8-bit luminance
    Gray8,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Gray8 => 1,
            FrameFormat::Rgb24 => 3,
        }
    }
}

/// An immutable camera frame with capture metadata.
///
/// Frames are shared by `Arc` so the capture collaborator, detectors, and
/// tests can hold the same buffer without copying. Detectors never mutate
/// frame data; at most the current and previous frame are retained.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonically increasing frame identifier
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
}

impl Frame {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected buffer size for the frame's dimensions and format
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Luminance of the pixel at (x, y), or None outside the frame.
    ///
    /// RGB frames use the BT.601 weights; Gray8 frames read directly.
    pub fn luma_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let idx = (y as usize * self.width as usize + x as usize)
            * self.format.bytes_per_pixel();

        match self.format {
            FrameFormat::Gray8 => self.data.get(idx).copied(),
            FrameFormat::Rgb24 => {
                let r = *self.data.get(idx)? as f32;
                let g = *self.data.get(idx + 1)? as f32;
                let b = *self.data.get(idx + 2)? as f32;
                Some((0.299 * r + 0.587 * g + 0.114 * b) as u8)
            }
        }
    }

    /// Frame age relative to now
    pub fn age(&self) -> std::time::Duration {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
    }

    /// Check if the frame is older than the specified duration
    pub fn is_older_than(&self, duration: std::time::Duration) -> bool {
        self.age() > duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Gray8.bytes_per_pixel(), 1);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = Frame::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480],
            640,
            480,
            FrameFormat::Gray8,
        );
        assert!(valid.validate_size());

        let invalid = Frame::new(
            2,
            SystemTime::now(),
            vec![0u8; 100],
            640,
            480,
            FrameFormat::Rgb24,
        );
        assert!(!invalid.validate_size());
    }

    #[test]
    fn test_luma_access_gray() {
        let mut data = vec![0u8; 4 * 4];
        data[1 * 4 + 2] = 200;
        let frame = Frame::new(1, SystemTime::now(), data, 4, 4, FrameFormat::Gray8);

        assert_eq!(frame.luma_at(2, 1), Some(200));
        assert_eq!(frame.luma_at(0, 0), Some(0));
        assert_eq!(frame.luma_at(4, 0), None);
        assert_eq!(frame.luma_at(0, 4), None);
    }

    #[test]
    fn test_luma_access_rgb() {
        // A single pure-white pixel converts to full luminance
        let frame = Frame::new(
            1,
            SystemTime::now(),
            vec![255u8, 255, 255],
            1,
            1,
            FrameFormat::Rgb24,
        );
        let luma = frame.luma_at(0, 0).unwrap();
        assert!(luma >= 254);
    }

    #[test]
    fn test_frame_age() {
        let past = SystemTime::now() - Duration::from_millis(100);
        let frame = Frame::new(1, past, vec![0u8; 1], 1, 1, FrameFormat::Gray8);

        assert!(frame.is_older_than(Duration::from_millis(50)));
        assert!(!frame.is_older_than(Duration::from_millis(200)));
    }
}
