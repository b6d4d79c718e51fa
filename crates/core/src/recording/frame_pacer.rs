//! Decides when the next frame may be acquired at a target rate,
//! independent of how fast the camera delivers or the loop spins.

use std::time::Duration;

/// Minimum spacing between two accepted captures: `1 / fps`.
///
/// A zero rate never allows a capture.
pub fn pacing_interval(fps: u32) -> Duration {
    if fps == 0 {
        return Duration::MAX;
    }
    Duration::from_secs(1) / fps
}

/// True once at least one pacing interval has passed since `last_capture`.
pub fn should_capture(now: Duration, last_capture: Duration, fps: u32) -> bool {
    now.saturating_sub(last_capture) >= pacing_interval(fps)
}

/// How long to wait before [`should_capture`] turns true.
pub fn time_until_next(now: Duration, last_capture: Duration, fps: u32) -> Duration {
    last_capture
        .saturating_add(pacing_interval(fps))
        .saturating_sub(now)
}
