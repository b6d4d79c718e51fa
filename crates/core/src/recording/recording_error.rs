use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::session_state::SessionState;
use crate::overlay::domain::frame_annotator::OverlayError;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("invalid recording configuration: {0}")]
    ConfigInvalid(String),
    #[error("cannot create segment {path}: {reason}")]
    OutputUnavailable { path: PathBuf, reason: String },
    #[error("failed writing segment {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },
    #[error("timestamp overlay unavailable: {0}")]
    ResourceUnavailable(#[from] OverlayError),
    /// A command the current lifecycle state does not accept. Nothing was
    /// changed; a running recording keeps going.
    #[error("cannot {command} while {state}")]
    InvalidState {
        command: &'static str,
        state: SessionState,
    },
}

/// Error category reported in status notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    ConfigInvalid,
    OutputUnavailable,
    WriteFailure,
    ResourceUnavailable,
    InvalidState,
}

impl RecordingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordingError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            RecordingError::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            RecordingError::OutputUnavailable { .. } => ErrorKind::OutputUnavailable,
            RecordingError::WriteFailure { .. } => ErrorKind::WriteFailure,
            RecordingError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            RecordingError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Only configuration mistakes can be retried without reconnecting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RecordingError::ConfigInvalid(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DeviceUnavailable => "DeviceUnavailable",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::OutputUnavailable => "OutputUnavailable",
            ErrorKind::WriteFailure => "WriteFailure",
            ErrorKind::ResourceUnavailable => "ResourceUnavailable",
            ErrorKind::InvalidState => "InvalidState",
        };
        f.write_str(name)
    }
}
