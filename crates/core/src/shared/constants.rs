/// Segment files are named `mv_<YYYY-MM-DD-HH-MM>.mp4`.
pub const SEGMENT_PREFIX: &str = "mv_";
pub const SEGMENT_EXTENSION: &str = "mp4";
pub const SEGMENT_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M";

pub const OVERLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const OVERLAY_ORIGIN: (u32, u32) = (10, 10);
pub const OVERLAY_FONT_SIZE: f32 = 32.0;
pub const OVERLAY_COLOR: [u8; 3] = [255, 255, 255];

pub const DEFAULT_FONT_NAME: &str = "DejaVuSans.ttf";

/// Well-known locations probed when no font path is configured.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\msgothic.ttc",
];

/// Consecutive empty or failed reads after which the camera counts as lost.
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 2;

pub const SECONDS_PER_MINUTE: u64 = 60;

/// Upper bound on one idle wait of the capture loop, so a stop request is
/// noticed quickly even at low frame rates.
pub const MAX_IDLE_SLEEP_MS: u64 = 50;
