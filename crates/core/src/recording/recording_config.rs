use std::path::PathBuf;
use std::time::Duration;

use super::frame_pacer;
use super::recording_error::RecordingError;
use crate::shared::constants::SECONDS_PER_MINUTE;
use crate::shared::resolution::Resolution;

/// Parameters of one recording episode. Fixed from `start` until the
/// episode ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingConfig {
    pub output_dir: PathBuf,
    pub fps: u32,
    pub segment_minutes: u32,
    pub resolution: Resolution,
}

impl RecordingConfig {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        fps: u32,
        segment_minutes: u32,
        resolution: Resolution,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            fps,
            segment_minutes,
            resolution,
        }
    }

    /// Checks every field without touching the camera or creating files.
    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.fps == 0 {
            return Err(RecordingError::ConfigInvalid(
                "fps must be positive".into(),
            ));
        }
        if self.segment_minutes == 0 {
            return Err(RecordingError::ConfigInvalid(
                "segment duration must be at least one minute".into(),
            ));
        }
        if !self.resolution.is_valid() {
            return Err(RecordingError::ConfigInvalid(format!(
                "resolution {} has a zero dimension",
                self.resolution
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(RecordingError::ConfigInvalid(format!(
                "output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        Ok(())
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segment_minutes as u64 * SECONDS_PER_MINUTE)
    }

    pub fn pacing_interval(&self) -> Duration {
        frame_pacer::pacing_interval(self.fps)
    }
}
