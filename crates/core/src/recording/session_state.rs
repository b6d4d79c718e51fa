use std::fmt;

/// Lifecycle of a [`CaptureSession`](super::capture_session::CaptureSession).
///
/// `Idle → Connected → Recording → Idle`, with `Connected → Connected` when
/// another device is selected before recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No camera held.
    #[default]
    Idle,
    /// Camera held, not recording.
    Connected,
    /// Capture loop running on its worker thread.
    Recording,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Recording => write!(f, "recording"),
        }
    }
}
