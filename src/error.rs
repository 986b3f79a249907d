//! Errors surfaced by a scan session.

use crate::decoder::DecodeError;
use crate::media::MediaError;

/// Message shown when the platform reports no camera at all.
pub const NO_VIDEO_INPUTS: &str = "no video input devices found";

/// Everything that can go wrong in a scan session.
///
/// Only [`ScanError::TransientDecodeError`] is recovered by the session
/// itself; the others end the session and need a new `start()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Camera access denied. Please ensure camera permissions are granted.")]
    PermissionDenied { cause: Option<String> },

    #[error("no video input devices found")]
    NoDeviceFound,

    #[error("Failed to access camera: {message}")]
    StreamAcquisitionFailed { message: String },

    #[error("Error scanning QR code: {0}")]
    TransientDecodeError(DecodeError),

    #[error("Camera stream ended unexpectedly: {message}")]
    TeardownFailed { message: String },

    /// `start()` while a session is already requesting or scanning
    #[error("A scan is already in progress")]
    AlreadyActive,

    /// The session was stopped before it produced a result
    #[error("Scan cancelled")]
    Cancelled,

    #[error("Scan result has no binary data to export")]
    ArtifactMissing,

    #[error("IO error: {0}")]
    Io(String),
}

impl ScanError {
    /// Whether the session survives this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::TransientDecodeError(_))
    }

    /// Underlying cause, for diagnostics.
    pub fn details(&self) -> Option<String> {
        match self {
            ScanError::PermissionDenied { cause } => cause.clone(),
            ScanError::TransientDecodeError(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl From<MediaError> for ScanError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::PermissionDenied => ScanError::PermissionDenied { cause: None },
            MediaError::DeviceBusy(msg) => ScanError::PermissionDenied {
                cause: Some(format!("camera busy: {}", msg)),
            },
            MediaError::StreamEnded => ScanError::TeardownFailed {
                message: MediaError::StreamEnded.to_string(),
            },
            MediaError::ReleaseFailed(msg) => ScanError::TeardownFailed { message: msg },
            other => ScanError::StreamAcquisitionFailed {
                message: other.to_string(),
            },
        }
    }
}

impl From<DecodeError> for ScanError {
    fn from(e: DecodeError) -> Self {
        if e.is_teardown() {
            ScanError::TeardownFailed {
                message: e.to_string(),
            }
        } else {
            ScanError::TransientDecodeError(e)
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        ScanError::Io(e.to_string())
    }
}
