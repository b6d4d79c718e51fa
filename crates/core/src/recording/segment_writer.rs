use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::recording_error::RecordingError;
use super::segment_naming::unique_segment_path;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Outcome of a segment that was flushed and closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosedSegment {
    pub sequence: u32,
    pub path: PathBuf,
    pub frames: usize,
}

/// One open output file of a recording.
///
/// Owns its [`VideoWriter`] for the whole segment. [`close`](Self::close)
/// consumes the segment; a segment dropped without being closed is closed
/// by its `Drop` impl, so the trailer is written on every exit path.
pub struct SegmentWriter {
    writer: Option<Box<dyn VideoWriter>>,
    path: PathBuf,
    sequence: u32,
    frames: usize,
}

impl SegmentWriter {
    /// Creates `mv_<opened_at>.mp4` (suffixed if taken) in `dir`.
    pub fn open(
        dir: &Path,
        sequence: u32,
        opened_at: &DateTime<Local>,
        metadata: &VideoMetadata,
        mut writer: Box<dyn VideoWriter>,
    ) -> Result<Self, RecordingError> {
        let path = unique_segment_path(dir, opened_at);
        writer
            .open(&path, metadata)
            .map_err(|e| RecordingError::OutputUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        log::info!(
            "Opened segment {sequence}: {} ({}x{} @ {} fps)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps
        );
        Ok(Self {
            writer: Some(writer),
            path,
            sequence,
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Frames accepted so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecordingError::WriteFailure {
                path: self.path.clone(),
                reason: "segment already closed".into(),
            })?;
        writer
            .write(frame)
            .map_err(|e| RecordingError::WriteFailure {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        self.frames += 1;
        Ok(())
    }

    pub fn close(mut self) -> Result<ClosedSegment, RecordingError> {
        self.finish()?;
        Ok(ClosedSegment {
            sequence: self.sequence,
            path: self.path.clone(),
            frames: self.frames,
        })
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.close().map_err(|e| RecordingError::WriteFailure {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        log::info!(
            "Closed segment {}: {} ({} frames)",
            self.sequence,
            self.path.display(),
            self.frames
        );
        Ok(())
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("{e}");
        }
    }
}
