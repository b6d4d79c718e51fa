use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::segment_naming::{parse_segment_name, SegmentName};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// A recorded segment found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentEntry {
    pub path: PathBuf,
    pub name: SegmentName,
}

impl SegmentEntry {
    /// Reads resolution, rate and frame count from the file.
    pub fn probe(&self) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        FfmpegReader::probe(&self.path)
    }
}

/// Segment files in `dir`, oldest first. Other files are ignored.
pub fn list_segments(dir: &Path) -> io::Result<Vec<SegmentEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(parse_segment_name) else {
            continue;
        };
        entries.push(SegmentEntry {
            path: entry.path(),
            name,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
