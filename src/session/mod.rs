//! Scan session lifecycle.
//!
//! A [`ScanController`] owns the camera for the length of one scan: it picks
//! a device, opens it, runs a [`crate::decoder::FrameDecoder`] over the
//! stream and releases everything when a code is found, the stream dies or
//! the caller stops it. Observers follow along through [`SessionSnapshot`]s.

mod controller;
mod handle;
mod state;

pub use controller::{ScanController, StopHandle};
pub use state::{SessionSnapshot, SessionState};
