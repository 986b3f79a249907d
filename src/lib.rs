//! qr-scanner library crate.
//!
//! Camera QR scanning built around a [`session::ScanController`]: it opens a
//! [`media::MediaSource`], feeds frames to a [`decoder::FrameDecoder`] and
//! publishes the [`result::ScanResult`].

#[cfg(feature = "camera")]
pub mod camera;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod media;
pub mod result;
pub mod session;

pub use error::ScanError;
pub use result::ScanResult;
pub use session::{ScanController, SessionSnapshot, SessionState};
