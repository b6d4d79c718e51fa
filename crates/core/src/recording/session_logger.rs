use std::collections::HashMap;
use std::time::Instant;

/// Observer for capture loop activity.
///
/// Lets the CLI print throughput and stage timings while embedders and
/// tests stay silent, without the loop knowing where output goes.
pub trait SessionLogger: Send {
    /// A frame was accepted by the encoder of segment `sequence`.
    fn frame_written(&mut self, sequence: u32, frames_in_segment: usize);

    /// Segment `sequence` was flushed and closed.
    fn segment_closed(&mut self, sequence: u32, frames: usize);

    /// How long one stage (`read`, `annotate`, `write`, `rotate`) took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-recording summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn frame_written(&mut self, _sequence: u32, _frames_in_segment: usize) {}
    fn segment_closed(&mut self, _sequence: u32, _frames: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one stage's durations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTiming {
    pub count: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageTiming {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// CLI logger: periodic progress through `log::info!` and a per-stage
/// timing summary when recording ends.
///
/// Progress is printed every `throttle_frames` frames. Only aggregates are
/// kept, so memory stays flat however long the recording runs.
pub struct StdoutSessionLogger {
    throttle_frames: usize,
    timings: HashMap<String, StageTiming>,
    start_time: Instant,
    total_frames: usize,
    closed_segments: usize,
}

impl StdoutSessionLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            start_time: Instant::now(),
            total_frames: 0,
            closed_segments: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.total_frames == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Recording summary ({} frames in {} segments, {:.1}s total):",
            self.total_frames,
            self.closed_segments,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let timing = &self.timings[stage];
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                timing.avg_ms(),
                timing.max_ms,
                timing.total_ms
            ));
        }

        if self.total_frames > 0 && elapsed_ms > 0.0 {
            let fps = self.total_frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Effective rate: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&StageTiming> {
        self.timings.get(stage)
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn frame_written(&mut self, sequence: u32, frames_in_segment: usize) {
        self.total_frames += 1;
        if frames_in_segment % self.throttle_frames == 0 {
            log::info!("Segment {sequence}: {frames_in_segment} frames");
        }
    }

    fn segment_closed(&mut self, sequence: u32, frames: usize) {
        self.closed_segments += 1;
        log::info!("Segment {sequence} finished with {frames} frames");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(timing) => timing.record(duration_ms),
            None => {
                let mut timing = StageTiming::default();
                timing.record(duration_ms);
                self.timings.insert(stage.to_string(), timing);
            }
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullSessionLogger;
        logger.frame_written(1, 1);
        logger.segment_closed(1, 1);
        logger.timing("read", 1.0);
        logger.info("ignored");
        logger.summary();
    }

    #[test]
    fn test_timing_records_per_stage() {
        let mut logger = StdoutSessionLogger::new(10);
        logger.timing("read", 20.0);
        logger.timing("read", 30.0);
        logger.timing("write", 5.0);

        let read = logger.timings_for("read").unwrap();
        assert_eq!(read.count, 2);
        assert_relative_eq!(read.avg_ms(), 25.0);
        assert_relative_eq!(read.max_ms, 30.0);
        assert_eq!(logger.timings_for("write").unwrap().count, 1);
        assert!(logger.timings_for("rotate").is_none());
    }

    #[test]
    fn test_frames_counted_across_segments() {
        let mut logger = StdoutSessionLogger::new(10);
        for i in 1..=5 {
            logger.frame_written(1, i);
        }
        logger.segment_closed(1, 5);
        for i in 1..=3 {
            logger.frame_written(2, i);
        }
        assert_eq!(logger.total_frames(), 8);
        assert_eq!(logger.closed_segments, 1);
    }

    #[test]
    fn test_summary_lists_stages_and_counts() {
        let mut logger = StdoutSessionLogger::new(10);
        logger.frame_written(1, 1);
        logger.segment_closed(1, 1);
        logger.timing("annotate", 2.0);
        logger.timing("write", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Recording summary (1 frames in 1 segments"));
        assert!(summary.contains("annotate"));
        assert!(summary.contains("write"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutSessionLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_retained_state_stays_bounded_over_long_runs() {
        let mut logger = StdoutSessionLogger::default();
        for i in 0..100_000 {
            logger.timing("read", (i % 7) as f64);
            logger.timing("write", 1.0);
            logger.frame_written(1, i + 1);
            logger.info("still recording");
        }

        assert_eq!(logger.timings.len(), 2);
        let read = logger.timings_for("read").unwrap();
        assert_eq!(read.count, 100_000);
        assert_relative_eq!(read.max_ms, 6.0);
        assert_relative_eq!(logger.timings_for("write").unwrap().total_ms, 100_000.0);
        assert_eq!(logger.total_frames(), 100_000);
        assert_eq!(logger.throttle_frames, 100);
    }
}
