//! A video source that replays one still image.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::types::{DeviceInfo, Frame, MediaError, StreamConstraints};
use super::{MediaSource, VideoStream};

/// Device id reported by [`StillImageSource`].
pub const STILL_DEVICE_ID: &str = "still-0";

/// Presents an image as a single virtual camera.
///
/// Every frame of the stream is a copy of the image, delivered at the
/// configured frame rate. Used to scan QR codes from files with the same
/// session machinery as a live camera.
#[derive(Debug)]
pub struct StillImageSource {
    frame: Arc<Frame>,
    frame_interval: Duration,
    open_streams: Arc<AtomicUsize>,
}

impl StillImageSource {
    pub fn new(frame: Frame, fps: u32) -> Self {
        Self {
            frame: Arc::new(frame),
            frame_interval: Duration::from_millis(1000 / u64::from(fps.max(1))),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Load an image file and convert it to RGB.
    pub fn from_path(path: &Path, fps: u32) -> Result<Self, image::ImageError> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::new(Frame::rgb(rgb.into_raw(), width, height), fps))
    }

    /// Number of streams whose tracks are still running.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

impl MediaSource for StillImageSource {
    fn enumerate_devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, MediaError>> {
        let mut device = DeviceInfo::video_input(STILL_DEVICE_ID, "Still image");
        device.description = format!("{}x{}", self.frame.width, self.frame.height);
        async move { Ok(vec![device]) }.boxed()
    }

    fn acquire<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, Result<Arc<dyn VideoStream>, MediaError>> {
        async move {
            if let Some(id) = &constraints.device_id {
                if id != STILL_DEVICE_ID {
                    return Err(MediaError::DeviceNotFound(id.clone()));
                }
            }
            self.open_streams.fetch_add(1, Ordering::SeqCst);
            let stream: Arc<dyn VideoStream> = Arc::new(StillStream {
                frame: Arc::clone(&self.frame),
                frame_interval: self.frame_interval,
                active: AtomicBool::new(true),
                delivered_first: AtomicBool::new(false),
                open_streams: Arc::clone(&self.open_streams),
            });
            Ok(stream)
        }
        .boxed()
    }
}

struct StillStream {
    frame: Arc<Frame>,
    frame_interval: Duration,
    active: AtomicBool,
    delivered_first: AtomicBool,
    open_streams: Arc<AtomicUsize>,
}

impl VideoStream for StillStream {
    fn device_id(&self) -> &str {
        STILL_DEVICE_ID
    }

    fn next_frame(&self) -> BoxFuture<'_, Result<Frame, MediaError>> {
        async move {
            if self.delivered_first.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(self.frame_interval).await;
            }
            if !self.is_active() {
                return Err(MediaError::StreamEnded);
            }
            let mut frame = (*self.frame).clone();
            frame.timestamp = std::time::Instant::now();
            Ok(frame)
        }
        .boxed()
    }

    fn stop_tracks(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for StillStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
