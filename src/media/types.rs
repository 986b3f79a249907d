//! Media types shared by every video source.

use std::fmt;
use std::time::Instant;

/// What kind of input a device provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    Other,
}

/// Which way a camera points, when the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
}

impl Facing {
    /// Guess the facing mode from a human-readable device name.
    pub fn from_device_name(name: &str) -> Option<Facing> {
        let lower = name.to_lowercase();
        if ["back", "rear", "environment"].iter().any(|k| lower.contains(k)) {
            Some(Facing::Environment)
        } else if ["front", "facetime", "user"].iter().any(|k| lower.contains(k)) {
            Some(Facing::User)
        } else {
            None
        }
    }
}

/// Information about an available capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Identifier passed back in [`StreamConstraints::device_id`]
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
    pub kind: DeviceKind,
    /// Facing mode, if known
    pub facing: Option<Facing>,
}

impl DeviceInfo {
    /// Describe a video input, guessing its facing mode from the name.
    pub fn video_input(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            facing: Facing::from_device_name(&name),
            name,
            description: String::new(),
            kind: DeviceKind::VideoInput,
        }
    }

    pub fn is_video_input(&self) -> bool {
        self.kind == DeviceKind::VideoInput
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

/// Capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 640x480, enough for a QR code held in front of the lens
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// 1280x720, for small or distant codes
    pub const HIGH: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HIGH
    }
}

/// Constraints passed to [`super::MediaSource::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Exact device to open; `None` lets the source pick by facing mode
    pub device_id: Option<String>,
    /// Preferred facing mode
    pub facing: Facing,
    pub resolution: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            device_id: None,
            facing: Facing::Environment,
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

/// Pixel format of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in RGB format
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// When the frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Build an RGB frame stamped with the current instant.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    /// Get the number of bytes per pixel (3 for RGB).
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the buffer holds exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.pixel_count() * self.bytes_per_pixel()
    }
}

/// Errors raised by a media source or one of its streams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Failed to query cameras: {0}")]
    QueryFailed(String),

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera is busy: {0}")]
    DeviceBusy(String),

    #[error("Camera device {0} not found")]
    DeviceNotFound(String),

    #[error("Failed to start camera stream: {0}")]
    StreamFailed(String),

    /// The stream's tracks were stopped; no more frames will arrive
    #[error("Camera stream has ended")]
    StreamEnded,

    /// No frame is ready yet; the caller may try again
    #[error("No frame available")]
    FrameUnavailable,

    #[error("Failed to release camera stream: {0}")]
    ReleaseFailed(String),
}

impl MediaError {
    /// Classify a backend error message, recognising permission problems.
    pub fn from_open_message(message: &str) -> MediaError {
        let lower = message.to_lowercase();
        if lower.contains("permission")
            || lower.contains("denied")
            || lower.contains("authorization")
            || lower.contains("not allowed")
        {
            MediaError::PermissionDenied
        } else if lower.contains("busy") || lower.contains("in use") {
            MediaError::DeviceBusy(message.to_string())
        } else {
            MediaError::StreamFailed(message.to_string())
        }
    }
}
