use std::path::Path;
use std::sync::Arc;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Abstracts segment encoding so the recording loop can write output
/// without depending on a specific codec library.
///
/// A writer is single-use: one `open`, any number of `write`s, one `close`.
pub trait VideoWriter: Send {
    /// Creates the output file and writes the container header.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Encodes one frame. A frame that fails here was not written.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered packets and writes the container trailer.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Builds a fresh writer for each segment. Shared between the session and
/// its capture thread.
pub type VideoWriterFactory = Arc<dyn Fn() -> Box<dyn VideoWriter> + Send + Sync>;
