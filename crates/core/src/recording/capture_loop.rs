use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use super::clock::Clock;
use super::frame_pacer;
use super::recording_config::RecordingConfig;
use super::recording_error::RecordingError;
use super::segment_writer::{ClosedSegment, SegmentWriter};
use super::session_event::SessionEvent;
use super::session_logger::SessionLogger;
use super::session_state::SessionState;
use crate::capture::domain::frame_source::FrameSource;
use crate::overlay::domain::frame_annotator::FrameAnnotator;
use crate::overlay::domain::timestamp_format::overlay_timestamp;
use crate::shared::constants::{MAX_CONSECUTIVE_READ_FAILURES, MAX_IDLE_SLEEP_MS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriterFactory;

/// One segment of a finished recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentRecord {
    pub sequence: u32,
    pub path: PathBuf,
    /// Clock reading at which the segment was opened.
    pub started_at: Duration,
    pub frames: usize,
}

/// What a recording episode produced, in segment order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordingSummary {
    pub segments: Vec<SegmentRecord>,
}

impl RecordingSummary {
    pub fn total_frames(&self) -> usize {
        self.segments.iter().map(|s| s.frames).sum()
    }

    /// Number of times a segment was closed to start the next one.
    pub fn rotations(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

/// The body of a recording episode. Owns the camera and the open segment
/// until [`run`](Self::run) returns.
pub(crate) struct CaptureLoop {
    camera: Box<dyn FrameSource>,
    segment: Option<SegmentWriter>,
    annotator: Arc<dyn FrameAnnotator>,
    new_writer: VideoWriterFactory,
    clock: Arc<dyn Clock>,
    config: RecordingConfig,
    metadata: VideoMetadata,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
    logger: Box<dyn SessionLogger>,
    segment_started: Duration,
    last_capture: Duration,
    consecutive_misses: u32,
    summary: RecordingSummary,
}

impl CaptureLoop {
    /// `segment` is the already-open first segment, started at `started_at`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        camera: Box<dyn FrameSource>,
        segment: SegmentWriter,
        started_at: Duration,
        annotator: Arc<dyn FrameAnnotator>,
        new_writer: VideoWriterFactory,
        clock: Arc<dyn Clock>,
        config: RecordingConfig,
        metadata: VideoMetadata,
        stop: Arc<AtomicBool>,
        events: Sender<SessionEvent>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        // The first slot opens one full interval after start
        Self {
            camera,
            segment: Some(segment),
            annotator,
            new_writer,
            clock,
            config,
            metadata,
            stop,
            events,
            logger,
            segment_started: started_at,
            last_capture: started_at,
            consecutive_misses: 0,
            summary: RecordingSummary::default(),
        }
    }

    /// Runs until the stop flag is set or a fatal error occurs. The open
    /// segment is closed and the camera released on every exit path.
    pub(crate) fn run(
        mut self,
    ) -> (
        Box<dyn SessionLogger>,
        Result<RecordingSummary, RecordingError>,
    ) {
        let captured = self.capture();
        let closed = self.close_segment();
        let outcome = captured.and(closed);

        self.camera.release();
        if let Err(e) = &outcome {
            log::error!("Recording stopped: {e}");
            self.logger.info(&format!("Recording stopped: {e}"));
            self.publish(SessionEvent::Failed {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        self.logger.summary();
        self.publish(SessionEvent::StateChanged(SessionState::Idle));

        let CaptureLoop {
            logger, summary, ..
        } = self;
        (logger, outcome.map(|()| summary))
    }

    fn capture(&mut self) -> Result<(), RecordingError> {
        let segment_duration = self.config.segment_duration();
        let fps = self.config.fps;
        let max_idle = Duration::from_millis(MAX_IDLE_SLEEP_MS);

        while !self.stop.load(Ordering::Relaxed) {
            let now = self.clock.elapsed();
            if now.saturating_sub(self.segment_started) >= segment_duration {
                self.rotate(now)?;
            } else if frame_pacer::should_capture(now, self.last_capture, fps) {
                self.capture_frame(now)?;
            } else {
                let until_capture = frame_pacer::time_until_next(now, self.last_capture, fps);
                let until_rotation = (self.segment_started + segment_duration).saturating_sub(now);
                self.clock
                    .sleep(until_capture.min(until_rotation).min(max_idle));
            }
        }
        Ok(())
    }

    /// The stamp is the wall time as the read starts, the same instant as
    /// `now`, so stamps keep the pacing gap whatever the read latency.
    fn capture_frame(&mut self, now: Duration) -> Result<(), RecordingError> {
        let read_at = self.clock.wall_time();
        let started = Instant::now();
        let frame = match self.camera.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.missed_read("camera returned no frame".into()),
            Err(e) => return self.missed_read(e.to_string()),
        };
        self.consecutive_misses = 0;
        self.logger.timing("read", elapsed_ms(started));

        let started = Instant::now();
        let frame = frame.with_captured_at(read_at);
        let annotated = self
            .annotator
            .annotate(&frame, &overlay_timestamp(&read_at))?;
        drop(frame);
        self.logger.timing("annotate", elapsed_ms(started));

        let started = Instant::now();
        let segment = self.segment.as_mut().ok_or_else(|| RecordingError::WriteFailure {
            path: self.config.output_dir.clone(),
            reason: "no open segment".into(),
        })?;
        segment.write_frame(&annotated)?;
        self.logger.timing("write", elapsed_ms(started));
        self.logger
            .frame_written(segment.sequence(), segment.frames());

        self.last_capture = now;
        Ok(())
    }

    /// Counts an empty or failed read; the camera is lost once the limit
    /// of consecutive misses is reached.
    fn missed_read(&mut self, reason: String) -> Result<(), RecordingError> {
        self.consecutive_misses += 1;
        log::warn!(
            "Camera read failed ({}/{}): {reason}",
            self.consecutive_misses,
            MAX_CONSECUTIVE_READ_FAILURES
        );
        if self.consecutive_misses >= MAX_CONSECUTIVE_READ_FAILURES {
            return Err(RecordingError::DeviceUnavailable(format!(
                "camera stopped delivering frames: {reason}"
            )));
        }
        Ok(())
    }

    fn rotate(&mut self, now: Duration) -> Result<(), RecordingError> {
        let started = Instant::now();
        let sequence = self.segment.as_ref().map_or(0, |s| s.sequence());
        self.close_segment()?;

        let segment = SegmentWriter::open(
            &self.config.output_dir,
            sequence + 1,
            &self.clock.wall_time(),
            &self.metadata,
            (self.new_writer)(),
        )?;
        self.publish(SessionEvent::SegmentOpened {
            sequence: segment.sequence(),
            path: segment.path().to_path_buf(),
        });
        self.segment = Some(segment);
        self.segment_started = now;
        self.logger.timing("rotate", elapsed_ms(started));
        Ok(())
    }

    fn close_segment(&mut self) -> Result<(), RecordingError> {
        let Some(segment) = self.segment.take() else {
            return Ok(());
        };
        let ClosedSegment {
            sequence,
            path,
            frames,
        } = segment.close()?;

        self.logger.segment_closed(sequence, frames);
        self.summary.segments.push(SegmentRecord {
            sequence,
            path: path.clone(),
            started_at: self.segment_started,
            frames,
        });
        self.publish(SessionEvent::SegmentClosed {
            sequence,
            path,
            frames,
        });
        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
