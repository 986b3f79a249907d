//! Video sources the scanner can read frames from.
//!
//! This module provides:
//! - The [`MediaSource`] and [`VideoStream`] traits the session controller
//!   talks to
//! - Shared types ([`DeviceInfo`], [`StreamConstraints`], [`Frame`])
//! - [`StillImageSource`], which replays a single image as a video feed
//!
//! The native camera backend lives in [`crate::camera`] behind the `camera`
//! feature.

mod still;
mod types;

use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use still::StillImageSource;
pub use types::{
    DeviceInfo, DeviceKind, Facing, Frame, FrameFormat, MediaError, Resolution, StreamConstraints,
};

/// A live stream from one capture device.
///
/// Tracks stay active until [`VideoStream::stop_tracks`] is called. Once
/// stopped, [`VideoStream::next_frame`] fails with [`MediaError::StreamEnded`].
pub trait VideoStream: Send + Sync {
    /// Id of the device this stream was opened on.
    fn device_id(&self) -> &str;

    /// Wait for the next frame.
    fn next_frame(&self) -> BoxFuture<'_, Result<Frame, MediaError>>;

    /// Stop every track of the stream. Calling it twice is harmless.
    fn stop_tracks(&self);

    fn is_active(&self) -> bool;
}

/// The platform's camera subsystem.
pub trait MediaSource: Send + Sync {
    /// List every capture device the platform reports.
    fn enumerate_devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, MediaError>>;

    /// Open a stream matching `constraints`.
    ///
    /// May prompt the user for camera permission.
    fn acquire<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, Result<Arc<dyn VideoStream>, MediaError>>;

    /// Give a stream back, stopping its tracks.
    fn release(&self, stream: Arc<dyn VideoStream>) -> Result<(), MediaError> {
        stream.stop_tracks();
        Ok(())
    }
}

/// Keep only video inputs, rear-facing devices first.
pub fn video_inputs(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    let mut inputs: Vec<DeviceInfo> = devices.into_iter().filter(DeviceInfo::is_video_input).collect();
    // stable sort keeps platform order within each group
    inputs.sort_by_key(|d| d.facing != Some(Facing::Environment));
    inputs
}

/// Pick the device a session should open.
///
/// An explicit `device_id` wins; otherwise the first device facing the
/// requested way, otherwise the first video input.
pub fn select_device<'a>(
    inputs: &'a [DeviceInfo],
    constraints: &StreamConstraints,
) -> Result<&'a DeviceInfo, MediaError> {
    if let Some(id) = &constraints.device_id {
        return inputs
            .iter()
            .find(|d| &d.id == id)
            .ok_or_else(|| MediaError::DeviceNotFound(id.clone()));
    }

    inputs
        .iter()
        .find(|d| d.facing == Some(constraints.facing))
        .or_else(|| inputs.first())
        .ok_or(MediaError::DeviceNotFound("any".to_string()))
}
