use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::shared::constants::OVERLAY_TIMESTAMP_FORMAT;

/// Formats a capture time as `YYYY-MM-DD HH:MM:SS` for the overlay.
pub fn overlay_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(OVERLAY_TIMESTAMP_FORMAT).to_string()
}
