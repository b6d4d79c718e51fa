use std::path::PathBuf;

/// Stream parameters of a segment: what the encoder is opened with and
/// what a probe reads back from a finished file.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Encoder parameters for a new segment; frame count and codec are
    /// unknown until the file is written.
    pub fn for_encoding(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps: fps as f64,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        }
    }

    /// Playback length implied by frame count and rate.
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_for_encoding() {
        let meta = VideoMetadata::for_encoding(1280, 720, 10);
        assert_eq!(meta.width, 1280);
        assert_eq!(meta.height, 720);
        assert_relative_eq!(meta.fps, 10.0);
        assert_eq!(meta.total_frames, 0);
        assert!(meta.source_path.is_none());
    }

    #[test]
    fn test_duration_from_frames() {
        let meta = VideoMetadata {
            total_frames: 600,
            ..VideoMetadata::for_encoding(640, 480, 10)
        };
        assert_relative_eq!(meta.duration_secs(), 60.0);
    }

    #[test]
    fn test_duration_with_zero_fps() {
        let meta = VideoMetadata {
            fps: 0.0,
            total_frames: 12,
            ..VideoMetadata::for_encoding(640, 480, 10)
        };
        assert_eq!(meta.duration_secs(), 0.0);
    }
}
