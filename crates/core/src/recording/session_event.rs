use std::path::PathBuf;

use super::recording_error::ErrorKind;
use super::session_state::SessionState;

/// Status notifications pushed from a session to whoever drives it.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    SegmentOpened {
        sequence: u32,
        path: PathBuf,
    },
    SegmentClosed {
        sequence: u32,
        path: PathBuf,
        frames: usize,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}
