//! Native camera backend built on nokhwa.
//!
//! This module provides a [`MediaSource`](crate::media::MediaSource) for
//! real webcams:
//! - Device enumeration via [`list_devices`]
//! - Streams backed by a background capture thread via [`CameraSource`]

mod capture;
mod capture_loop;
mod device;
mod frame_utils;

pub use capture::{CameraSource, CameraStream};
pub use device::list_devices;
