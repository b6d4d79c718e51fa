use std::path::PathBuf;

use thiserror::Error;

use crate::shared::font_resolver::FontResolveError;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error(transparent)]
    Font(#[from] FontResolveError),
    #[error("font {path} could not be parsed")]
    InvalidFont { path: PathBuf },
    #[error("frame has {0} channels; overlay needs RGB")]
    UnsupportedFrame(u8),
}

/// Burns text into frames.
///
/// Annotation is copy-on-write: the caller's frame is never modified.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(&self, frame: &Frame, text: &str) -> Result<Frame, OverlayError>;
}
