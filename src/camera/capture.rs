//! Camera streams and the nokhwa-backed media source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{oneshot, watch};

use super::capture_loop::{run_capture_loop, CaptureCommand, CaptureContext};
use super::device::{camera_index, list_devices};
use crate::media::{
    select_device, video_inputs, DeviceInfo, Frame, MediaError, MediaSource, Resolution,
    StreamConstraints, VideoStream,
};

/// The system's cameras, opened through nokhwa.
#[derive(Debug, Default)]
pub struct CameraSource;

impl CameraSource {
    pub fn new() -> Self {
        Self
    }
}

impl MediaSource for CameraSource {
    fn enumerate_devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, MediaError>> {
        async {
            tokio::task::spawn_blocking(list_devices)
                .await
                .map_err(|e| MediaError::QueryFailed(e.to_string()))?
        }
        .boxed()
    }

    fn acquire<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, Result<Arc<dyn VideoStream>, MediaError>> {
        async move {
            let device_id = match &constraints.device_id {
                Some(id) => id.clone(),
                None => {
                    let inputs = video_inputs(self.enumerate_devices().await?);
                    select_device(&inputs, constraints)?.id.clone()
                }
            };
            let stream = CameraStream::open(&device_id, constraints.clone()).await?;
            let stream: Arc<dyn VideoStream> = Arc::new(stream);
            Ok(stream)
        }
        .boxed()
    }
}

/// A running camera stream.
///
/// A background thread captures frames continuously and publishes the
/// latest one; [`VideoStream::next_frame`] waits for the next publication.
pub struct CameraStream {
    device_id: String,
    /// Latest captured frame (written by the capture thread)
    frames: tokio::sync::Mutex<watch::Receiver<Option<Frame>>>,
    capture_thread: Mutex<Option<JoinHandle<()>>>,
    command_tx: Mutex<Option<Sender<CaptureCommand>>>,
    stop_signal: Arc<AtomicBool>,
    actual_resolution: Resolution,
    actual_fps: u32,
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("device_id", &self.device_id)
            .field("is_active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl CameraStream {
    /// Open the camera and wait until its stream is running.
    ///
    /// # Errors
    /// * `MediaError::PermissionDenied` - If camera access is denied
    /// * `MediaError::DeviceBusy` / `MediaError::StreamFailed` - If the camera fails to open
    pub async fn open(device_id: &str, constraints: StreamConstraints) -> Result<Self, MediaError> {
        let index = camera_index(device_id);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (command_tx, commands) = mpsc::channel();
        let (frames_tx, frames_rx) = watch::channel(None);
        let (opened_tx, opened_rx) = oneshot::channel();

        let ctx = CaptureContext {
            index,
            constraints,
            stop: Arc::clone(&stop_signal),
            commands,
            frames: frames_tx,
            opened: opened_tx,
        };
        let handle = std::thread::spawn(move || run_capture_loop(ctx));

        let mut stream = Self {
            device_id: device_id.to_string(),
            frames: tokio::sync::Mutex::new(frames_rx),
            capture_thread: Mutex::new(Some(handle)),
            command_tx: Mutex::new(Some(command_tx)),
            stop_signal,
            actual_resolution: Resolution::default(),
            actual_fps: 0,
        };

        match opened_rx.await {
            Ok(Ok((resolution, fps))) => {
                log::info!(
                    "Camera {} streaming at {}x{} @ {} fps",
                    device_id,
                    resolution.width,
                    resolution.height,
                    fps
                );
                stream.actual_resolution = resolution;
                stream.actual_fps = fps;
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.stop_tracks();
                Err(e)
            }
            Err(_) => {
                stream.stop_tracks();
                Err(MediaError::StreamFailed(
                    "Capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Resolution the camera actually delivers.
    pub fn actual_resolution(&self) -> Resolution {
        self.actual_resolution
    }

    pub fn actual_fps(&self) -> u32 {
        self.actual_fps
    }
}

impl VideoStream for CameraStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&self) -> BoxFuture<'_, Result<Frame, MediaError>> {
        async move {
            if !self.is_active() {
                return Err(MediaError::StreamEnded);
            }
            let mut frames = self.frames.lock().await;
            if frames.changed().await.is_err() {
                return Err(MediaError::StreamEnded);
            }
            let frame = frames.borrow_and_update().clone();
            frame.ok_or(MediaError::FrameUnavailable)
        }
        .boxed()
    }

    /// Signal the capture thread and wait for it to close the camera.
    fn stop_tracks(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(tx) = self.command_tx.lock().ok().and_then(|mut tx| tx.take()) {
            let _ = tx.send(CaptureCommand::Stop);
        }

        let handle = self.capture_thread.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Capture thread for camera {} panicked", self.device_id);
            }
        }
    }

    fn is_active(&self) -> bool {
        !self.stop_signal.load(Ordering::SeqCst)
            && self
                .capture_thread
                .lock()
                .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
                .unwrap_or(false)
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
