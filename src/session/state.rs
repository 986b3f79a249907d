//! Observable session state.

use std::fmt;

use crate::error::ScanError;
use crate::result::ScanResult;

/// Lifecycle of a scan session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for the camera (enumeration, permission prompt, open)
    Requesting,
    /// Decode loop running
    Scanning,
    Error,
}

impl SessionState {
    /// Whether a session is in flight and holds (or is about to hold) a camera.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Requesting | SessionState::Scanning)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Scanning => "scanning",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Everything an observer can see about the session at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Bumped by every start, stop and terminal transition
    pub generation: u64,
    pub result: Option<ScanResult>,
    pub error: Option<ScanError>,
    /// Decode attempts in the current session that found nothing or failed
    pub attempts: u64,
    /// Most recent transient decode error, if any
    pub last_decode_error: Option<ScanError>,
    /// Device the current session opened
    pub device: Option<String>,
}
