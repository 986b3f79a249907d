//! Stub media sources and decoders shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Notify;

use qr_scanner::decoder::{
    DecodeError, DecodeOptions, Decoded, FrameDecoder, SampledDecoder, SingleShotDecoder,
};
use qr_scanner::media::{
    DeviceInfo, DeviceKind, Frame, MediaError, MediaSource, StreamConstraints, VideoStream,
};
use qr_scanner::{ScanController, SessionSnapshot, SessionState};

/// Media source that counts every call and can hold acquisitions open.
#[derive(Default)]
pub struct StubMedia {
    pub devices: Vec<DeviceInfo>,
    pub enumerations: AtomicUsize,
    pub acquisitions: AtomicUsize,
    pub releases: AtomicUsize,
    pub active_tracks: Arc<AtomicUsize>,
    /// Acquisitions wait for a permit here when set
    pub gate: Option<Arc<Notify>>,
    /// Signalled whenever an acquisition begins
    pub acquire_started: Arc<Notify>,
    pub acquire_error: Mutex<Option<MediaError>>,
    /// Streams end on their own after this many frames
    pub frames_per_stream: Option<usize>,
    pub last_device: Mutex<Option<String>>,
    /// Each release blocks this long before stopping tracks
    pub release_delay: Option<Duration>,
    /// Signalled whenever a release begins
    pub release_started: Arc<Notify>,
}

impl StubMedia {
    /// One rear-facing camera.
    pub fn new() -> Self {
        Self::with_devices(vec![DeviceInfo::video_input("cam-0", "Back Camera")])
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn failing(self, error: MediaError) -> Self {
        *self.acquire_error.lock().unwrap() = Some(error);
        self
    }

    pub fn ending_after(mut self, frames: usize) -> Self {
        self.frames_per_stream = Some(frames);
        self
    }

    pub fn slow_release(mut self, delay: Duration) -> Self {
        self.release_delay = Some(delay);
        self
    }

    /// Let one pending (or the next) acquisition complete.
    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl MediaSource for StubMedia {
    fn enumerate_devices(&self) -> BoxFuture<'_, Result<Vec<DeviceInfo>, MediaError>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let devices = self.devices.clone();
        async move { Ok(devices) }.boxed()
    }

    fn acquire<'a>(
        &'a self,
        constraints: &'a StreamConstraints,
    ) -> BoxFuture<'a, Result<Arc<dyn VideoStream>, MediaError>> {
        async move {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            *self.last_device.lock().unwrap() = constraints.device_id.clone();
            self.acquire_started.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(error) = self.acquire_error.lock().unwrap().clone() {
                return Err(error);
            }

            self.active_tracks.fetch_add(1, Ordering::SeqCst);
            let stream: Arc<dyn VideoStream> = Arc::new(StubStream {
                device_id: constraints.device_id.clone().unwrap_or_default(),
                active: AtomicBool::new(true),
                frames_left: self.frames_per_stream.map(AtomicUsize::new),
                active_tracks: Arc::clone(&self.active_tracks),
            });
            Ok(stream)
        }
        .boxed()
    }

    fn release(&self, stream: Arc<dyn VideoStream>) -> Result<(), MediaError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.release_started.notify_one();
        if let Some(delay) = self.release_delay {
            std::thread::sleep(delay);
        }
        stream.stop_tracks();
        Ok(())
    }
}

/// Stream of tiny blank frames, one per millisecond.
pub struct StubStream {
    device_id: String,
    active: AtomicBool,
    frames_left: Option<AtomicUsize>,
    active_tracks: Arc<AtomicUsize>,
}

impl VideoStream for StubStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&self) -> BoxFuture<'_, Result<Frame, MediaError>> {
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            if !self.is_active() {
                return Err(MediaError::StreamEnded);
            }
            if let Some(left) = &self.frames_left {
                // unplugged: the stream dies without its tracks being stopped
                if left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_err()
                {
                    return Err(MediaError::StreamEnded);
                }
            }
            Ok(Frame::rgb(vec![0; 4 * 4 * 3], 4, 4))
        }
        .boxed()
    }

    fn stop_tracks(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.active_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Finds nothing until `ready` is set, then decodes `text`.
pub struct FixedDecoder {
    pub text: &'static str,
    pub ready: Arc<AtomicBool>,
}

impl FixedDecoder {
    pub fn immediate(text: &'static str) -> Self {
        Self {
            text,
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Decoder plus the flag that lets it succeed.
    pub fn held(text: &'static str) -> (Self, Arc<AtomicBool>) {
        let ready = Arc::new(AtomicBool::new(false));
        (
            Self {
                text,
                ready: Arc::clone(&ready),
            },
            ready,
        )
    }
}

impl SingleShotDecoder for FixedDecoder {
    fn decode(
        &mut self,
        _luma: &[u8],
        _width: usize,
        _height: usize,
        _options: &DecodeOptions,
    ) -> Result<Option<Decoded>, DecodeError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(Some(Decoded::from_text(self.text)))
        } else {
            Ok(None)
        }
    }
}

/// Every attempt fails with a checksum error.
pub struct AlwaysFailing;

impl SingleShotDecoder for AlwaysFailing {
    fn decode(
        &mut self,
        _luma: &[u8],
        _width: usize,
        _height: usize,
        _options: &DecodeOptions,
    ) -> Result<Option<Decoded>, DecodeError> {
        Err(DecodeError::Unreadable("checksum mismatch".to_string()))
    }
}

/// Sampled decoder ticking every millisecond.
pub fn fast<D: SingleShotDecoder>(decoder: D) -> Arc<dyn FrameDecoder> {
    Arc::new(SampledDecoder::with_options(
        decoder,
        DecodeOptions::default(),
        Duration::from_millis(1),
    ))
}

pub fn controller(media: &Arc<StubMedia>, decoder: Arc<dyn FrameDecoder>) -> ScanController {
    ScanController::new(
        Arc::clone(media) as Arc<dyn MediaSource>,
        decoder,
        StreamConstraints::default(),
    )
}

/// Wait (bounded) until the session reaches `state`.
pub async fn wait_for_state(controller: &ScanController, state: SessionState) -> SessionSnapshot {
    let mut updates = controller.subscribe();
    let snapshot =
        tokio::time::timeout(Duration::from_secs(2), updates.wait_for(|s| s.state == state))
            .await
            .unwrap_or_else(|_| panic!("session never reached {}", state))
            .expect("controller dropped")
            .clone();
    snapshot
}

pub fn audio_device(id: &str) -> DeviceInfo {
    DeviceInfo {
        id: id.to_string(),
        name: "Built-in Microphone".to_string(),
        description: String::new(),
        kind: DeviceKind::AudioInput,
        facing: None,
    }
}
