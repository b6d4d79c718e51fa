use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone};

use crate::shared::constants::{SEGMENT_EXTENSION, SEGMENT_NAME_FORMAT, SEGMENT_PREFIX};

/// Parsed form of a segment file name such as `mv_2024-05-01-12-30_2.mp4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentName {
    /// Minute the segment was opened, in local time.
    pub started_at: NaiveDateTime,
    /// Collision counter; 0 when the name carries no `_n` suffix.
    pub suffix: u32,
}

/// `mv_<YYYY-MM-DD-HH-MM>.mp4`, or `mv_<...>_<suffix>.mp4` for `suffix > 0`.
pub fn segment_file_name<Tz: TimeZone>(opened_at: &DateTime<Tz>, suffix: u32) -> String
where
    Tz::Offset: Display,
{
    let stamp = opened_at.format(SEGMENT_NAME_FORMAT);
    if suffix == 0 {
        format!("{SEGMENT_PREFIX}{stamp}.{SEGMENT_EXTENSION}")
    } else {
        format!("{SEGMENT_PREFIX}{stamp}_{suffix}.{SEGMENT_EXTENSION}")
    }
}

/// First name for `opened_at` that does not exist yet in `dir`.
///
/// Two segments opened within the same minute (stop then start again)
/// would otherwise share a name and the second would overwrite the first.
pub fn unique_segment_path<Tz: TimeZone>(dir: &Path, opened_at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: Display,
{
    let mut suffix = 0;
    loop {
        let candidate = dir.join(segment_file_name(opened_at, suffix));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Recognises names produced by [`segment_file_name`].
pub fn parse_segment_name(name: &str) -> Option<SegmentName> {
    let stem = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXTENSION)?
        .strip_suffix('.')?;

    let (stamp, suffix) = match stem.split_once('_') {
        Some((stamp, n)) => {
            let suffix = n.parse::<u32>().ok().filter(|&n| n > 0)?;
            (stamp, suffix)
        }
        None => (stem, 0),
    };

    let started_at = NaiveDateTime::parse_from_str(stamp, SEGMENT_NAME_FORMAT).ok()?;
    // Reject lenient parses like single-digit months
    if started_at.format(SEGMENT_NAME_FORMAT).to_string() != stamp {
        return None;
    }
    Some(SegmentName { started_at, suffix })
}
