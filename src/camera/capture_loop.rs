//! Background capture thread implementation.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use super::frame_utils::convert_to_rgb;
use crate::media::{Frame, MediaError, Resolution, StreamConstraints};

/// Commands sent to the capture thread.
pub enum CaptureCommand {
    Stop,
}

/// Everything the capture thread needs, moved in at spawn time.
pub struct CaptureContext {
    pub index: CameraIndex,
    pub constraints: StreamConstraints,
    pub stop: Arc<AtomicBool>,
    pub commands: Receiver<CaptureCommand>,
    pub frames: watch::Sender<Option<Frame>>,
    pub opened: oneshot::Sender<Result<(Resolution, u32), MediaError>>,
}

/// Run the capture loop in a background thread.
///
/// The camera is created inside the thread since `nokhwa::Camera` isn't
/// `Send`. Dropping `frames` on exit wakes any reader with a closed channel.
pub fn run_capture_loop(ctx: CaptureContext) {
    let CaptureContext {
        index,
        constraints,
        stop,
        commands,
        frames,
        opened,
    } = ctx;

    let mut camera = match open_camera_with_fallback(&index, &constraints) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = opened.send(Err(MediaError::from_open_message(&e.to_string())));
        return;
    }

    let res = camera.resolution();
    let actual = Resolution {
        width: res.width(),
        height: res.height(),
    };
    if opened.send(Ok((actual, camera.frame_rate()))).is_err() {
        // acquirer went away before the stream was ready
        let _ = camera.stop_stream();
        return;
    }

    while !stop.load(Ordering::Relaxed) {
        if let Ok(CaptureCommand::Stop) = commands.try_recv() {
            break;
        }

        if let Ok(raw_frame) = camera.frame() {
            // conversion failures skip the frame
            if let Some(frame) = convert_to_rgb(&raw_frame) {
                frames.send_replace(Some(frame));
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Camera {:?} did not stop cleanly: {}", index, e);
    }
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(
    index: &CameraIndex,
    constraints: &StreamConstraints,
) -> Result<Camera, MediaError> {
    let resolution = nokhwa::utils::Resolution::new(
        constraints.resolution.width,
        constraints.resolution.height,
    );
    // NV12 (native macOS), then MJPEG, then whatever the camera offers
    let format_attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::NV12,
            constraints.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            NokhwaFrameFormat::MJPEG,
            constraints.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;

    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                log::debug!("Camera format attempt failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => MediaError::from_open_message(&e.to_string()),
        None => MediaError::StreamFailed("no camera format accepted".to_string()),
    })
}
