//! The scan session state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::{self, RuntimeFlavor};
use tokio::sync::watch;

use super::handle::DecoderHandle;
use super::state::{SessionSnapshot, SessionState};
use crate::decoder::{CancelToken, DecodeError, Decoded, FrameDecoder, ResultCallback};
use crate::error::ScanError;
use crate::media::{self, MediaError, MediaSource, StreamConstraints, VideoStream};
use crate::result::ScanResult;

/// Drives one camera through `Idle → Requesting → Scanning → Idle`.
///
/// Every `start()`, `stop()` and terminal transition bumps a generation
/// counter. An acquisition or decode attempt that completes after its
/// generation has moved on only releases what it holds; it never changes
/// state. A session that ends keeps its state until its camera is released,
/// then publishes `Idle` or `Error`, so `start()` never overlaps a release.
/// Dropping the controller stops the session.
pub struct ScanController {
    shared: Arc<Shared>,
}

/// Stops a session from another thread, e.g. a Ctrl-C handler.
#[derive(Clone)]
pub struct StopHandle {
    shared: Weak<Shared>,
}

impl StopHandle {
    /// Same as [`ScanController::stop`]. Does nothing once the controller is
    /// gone.
    pub fn stop(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop();
        }
    }
}

struct Shared {
    media: Arc<dyn MediaSource>,
    decoder: Arc<dyn FrameDecoder>,
    constraints: StreamConstraints,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<SessionSnapshot>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    generation: u64,
    cancel: Option<CancelToken>,
    handle: Option<DecoderHandle>,
    /// An ended session's camera is still being released
    releasing: bool,
}

/// How a session ended, published once its camera is released.
enum Ending {
    Stopped,
    Decoded(ScanResult),
    Failed(ScanError),
}

impl ScanController {
    pub fn new(
        media: Arc<dyn MediaSource>,
        decoder: Arc<dyn FrameDecoder>,
        constraints: StreamConstraints,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                media,
                decoder,
                constraints,
                inner: Mutex::new(Inner::default()),
                snapshot,
            }),
        }
    }

    /// Open a camera and start decoding.
    ///
    /// Valid from `Idle` and `Error`; clears the previous result and error.
    /// Returns once the decode loop runs or the session failed.
    ///
    /// # Errors
    /// * `ScanError::AlreadyActive` - A session is requesting or scanning
    /// * `ScanError::Cancelled` - `stop()` was called while the camera opened
    /// * Any acquisition error, which also moves the session to `Error`
    pub async fn start(&self) -> Result<(), ScanError> {
        self.shared.start().await.map(|_| ())
    }

    /// Start a session and wait for its outcome.
    ///
    /// # Errors
    /// Fails like [`ScanController::start`], with the session's terminal
    /// error, or with `ScanError::Cancelled` when stopped before a result.
    pub async fn scan(&self) -> Result<ScanResult, ScanError> {
        let mut updates = self.subscribe();
        let generation = self.shared.start().await?;

        let snapshot = updates
            .wait_for(|s| s.generation != generation)
            .await
            .map_err(|_| ScanError::Cancelled)?
            .clone();

        match (snapshot.result, snapshot.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ScanError::Cancelled),
        }
    }

    /// Halt decoding, release the camera and return to `Idle`.
    ///
    /// Does nothing from `Idle` or `Error`. The camera is released on the
    /// calling thread; async callers should prefer
    /// [`ScanController::shutdown`].
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Same as [`ScanController::stop`], releasing the camera on the
    /// blocking pool.
    pub async fn shutdown(&self) {
        self.shared.shutdown().await;
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshot.borrow().state
    }

    pub fn result(&self) -> Option<ScanResult> {
        self.shared.snapshot.borrow().result.clone()
    }

    pub fn error(&self) -> Option<ScanError> {
        self.shared.snapshot.borrow().error.clone()
    }

    /// Name of the decode strategy in use.
    pub fn strategy(&self) -> &'static str {
        self.shared.decoder.name()
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror `inner` into the watch channel. Called with the lock held so
    /// observers see transitions in order.
    fn publish(&self, inner: &Inner, update: impl FnOnce(&mut SessionSnapshot)) {
        self.snapshot.send_modify(|s| {
            s.state = inner.state;
            s.generation = inner.generation;
            update(s);
        });
    }

    /// Returns the generation of the session that was started.
    async fn start(self: &Arc<Self>) -> Result<u64, ScanError> {
        let (generation, cancel) = self.begin_request()?;
        log::info!("Starting scan session {} ({})", generation, self.decoder.name());

        match self.open_stream(&cancel).await {
            Ok(stream) => self.commit(generation, cancel, stream).await.map(|_| generation),
            Err(e) => Err(self.fail_request(generation, e)),
        }
    }

    fn begin_request(&self) -> Result<(u64, CancelToken), ScanError> {
        let mut inner = self.lock();
        if inner.state.is_active() || inner.releasing {
            return Err(ScanError::AlreadyActive);
        }

        inner.generation += 1;
        inner.state = SessionState::Requesting;
        let cancel = CancelToken::new();
        inner.cancel = Some(cancel.clone());
        self.publish(&inner, |s| {
            s.result = None;
            s.error = None;
            s.attempts = 0;
            s.last_decode_error = None;
            s.device = None;
        });
        Ok((inner.generation, cancel))
    }

    async fn open_stream(&self, cancel: &CancelToken) -> Result<Arc<dyn VideoStream>, ScanError> {
        let devices = self.media.enumerate_devices().await?;
        let inputs = media::video_inputs(devices);
        if inputs.is_empty() {
            return Err(ScanError::NoDeviceFound);
        }
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let device = media::select_device(&inputs, &self.constraints)?;
        log::info!("Opening camera {}", device);
        let constraints = StreamConstraints {
            device_id: Some(device.id.clone()),
            ..self.constraints.clone()
        };
        Ok(self.media.acquire(&constraints).await?)
    }

    /// Record an acquisition failure. A stopped session stays `Idle`.
    fn fail_request(&self, generation: u64, error: ScanError) -> ScanError {
        let mut inner = self.lock();
        if inner.generation != generation || matches!(error, ScanError::Cancelled) {
            return ScanError::Cancelled;
        }

        log::error!("Scan session {} failed: {}", generation, error);
        inner.generation += 1;
        inner.state = SessionState::Error;
        inner.cancel = None;
        self.publish(&inner, |s| s.error = Some(error.clone()));
        error
    }

    /// Move to `Scanning` with a freshly acquired stream, unless the session
    /// was stopped while the camera opened.
    ///
    /// The loop starts and its handle is stored under one lock, so a
    /// concurrent `stop()` either sees the handle or makes this a late stream.
    async fn commit(
        self: &Arc<Self>,
        generation: u64,
        cancel: CancelToken,
        stream: Arc<dyn VideoStream>,
    ) -> Result<(), ScanError> {
        {
            let mut inner = self.lock();
            if inner.generation == generation && !cancel.is_cancelled() {
                let controls = self.decoder.begin(
                    Arc::clone(&stream),
                    cancel,
                    self.attempt_callback(generation),
                );
                let device = stream.device_id().to_string();
                inner.handle = Some(DecoderHandle::new(stream, controls));
                inner.state = SessionState::Scanning;
                self.publish(&inner, |s| s.device = Some(device));
                return Ok(());
            }
        }

        log::info!(
            "Scan stopped while camera {} was opening, releasing it",
            stream.device_id()
        );
        let released =
            release_off_thread(Arc::clone(&self.media), move |media| media.release(stream)).await;
        if let Err(e) = released {
            log::warn!("Failed to release late camera stream: {}", e);
        }
        Err(ScanError::Cancelled)
    }

    fn attempt_callback(self: &Arc<Self>, generation: u64) -> ResultCallback {
        let shared = Arc::downgrade(self);
        Arc::new(move |decoded, error| {
            if let Some(shared) = shared.upgrade() {
                shared.on_attempt(generation, decoded, error);
            }
        })
    }

    fn on_attempt(
        self: &Arc<Self>,
        generation: u64,
        decoded: Option<Decoded>,
        error: Option<DecodeError>,
    ) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != SessionState::Scanning {
            return;
        }

        let ending = match (decoded, error) {
            (Some(decoded), _) => {
                let result = ScanResult::from_decoded(decoded);
                log::info!("Scan session {} decoded {} bytes", generation, result.text.len());
                Ending::Decoded(result)
            }
            (None, Some(e)) if e.is_teardown() => {
                let error = ScanError::from(e);
                log::error!("Scan session {} lost its camera: {}", generation, error);
                Ending::Failed(error)
            }
            (None, Some(e)) => {
                log::warn!("Error scanning QR code: {}", e);
                self.publish(&inner, |s| {
                    s.attempts += 1;
                    s.last_decode_error = Some(ScanError::from(e));
                });
                return;
            }
            (None, None) => {
                self.publish(&inner, |s| s.attempts += 1);
                return;
            }
        };

        let handle = self.end_session(&mut inner);
        drop(inner);
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.release_and_settle(handle, ending).await });
    }

    /// Blocking stop for synchronous callers (`Drop`, signal handlers).
    fn stop(&self) {
        let mut inner = self.lock();
        if !inner.state.is_active() || inner.releasing {
            return;
        }

        log::info!("Stopping scan session {}", inner.generation);
        let handle = self.end_session(&mut inner);
        drop(inner);
        let released = handle.map_or(Ok(()), |handle| self.release_in_place(handle));
        self.settle(&mut self.lock(), Ending::Stopped, released);
    }

    async fn shutdown(&self) {
        let handle = {
            let mut inner = self.lock();
            if !inner.state.is_active() || inner.releasing {
                return;
            }
            log::info!("Shutting down scan session {}", inner.generation);
            self.end_session(&mut inner)
        };
        self.release_and_settle(handle, Ending::Stopped).await;
    }

    /// Bump the generation, cancel the loop and take the handle.
    ///
    /// The state is left as it is until [`Shared::settle`], and `releasing`
    /// keeps `start()` out until then.
    fn end_session(&self, inner: &mut Inner) -> Option<DecoderHandle> {
        inner.generation += 1;
        inner.releasing = true;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.handle.take()
    }

    async fn release_and_settle(&self, handle: Option<DecoderHandle>, ending: Ending) {
        let released = match handle {
            Some(handle) => {
                let device = handle.device_id().to_string();
                let released =
                    release_off_thread(Arc::clone(&self.media), move |media| handle.release(media))
                        .await;
                log_release(&device, &released);
                released
            }
            None => Ok(()),
        };
        self.settle(&mut self.lock(), ending, released);
    }

    /// Release on the calling thread. On a multi-thread runtime the worker
    /// is handed off to the blocking pool first.
    fn release_in_place(&self, handle: DecoderHandle) -> Result<(), MediaError> {
        let device = handle.device_id().to_string();
        let release = || handle.release(self.media.as_ref());
        let released = match runtime::Handle::try_current() {
            Ok(rt) if rt.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(release)
            }
            _ => release(),
        };
        log_release(&device, &released);
        released
    }

    /// Publish the terminal state of a session whose camera is released.
    fn settle(&self, inner: &mut Inner, ending: Ending, released: Result<(), MediaError>) {
        inner.releasing = false;
        let (state, result, error) = match (ending, released) {
            (Ending::Decoded(result), Ok(())) => (SessionState::Idle, Some(result), None),
            (Ending::Decoded(result), Err(e)) => {
                (SessionState::Error, Some(result), Some(ScanError::from(e)))
            }
            (Ending::Stopped, Ok(())) => (SessionState::Idle, None, None),
            (Ending::Stopped, Err(e)) => (SessionState::Error, None, Some(ScanError::from(e))),
            (Ending::Failed(error), _) => (SessionState::Error, None, Some(error)),
        };
        inner.state = state;
        self.publish(inner, |s| {
            s.result = result;
            s.error = error;
        });
    }
}

/// Run a camera release on the blocking pool.
async fn release_off_thread<F>(media: Arc<dyn MediaSource>, release: F) -> Result<(), MediaError>
where
    F: FnOnce(&dyn MediaSource) -> Result<(), MediaError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || release(media.as_ref()))
        .await
        .unwrap_or_else(|e| Err(MediaError::ReleaseFailed(e.to_string())))
}

fn log_release(device: &str, released: &Result<(), MediaError>) {
    match released {
        Ok(()) => log::debug!("Released camera {}", device),
        Err(e) => log::error!("Failed to release camera {}: {}", device, e),
    }
}
