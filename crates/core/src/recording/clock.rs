use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

/// Time source for the capture loop.
///
/// Pacing and rotation run on the monotonic [`elapsed`](Clock::elapsed)
/// reading; file names and overlay text use [`wall_time`](Clock::wall_time).
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn elapsed(&self) -> Duration;

    fn wall_time(&self) -> DateTime<Local>;

    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
