//! Frame decoders: turning a video stream into QR payloads.
//!
//! The session controller only sees the [`FrameDecoder`] capability. Two
//! strategies implement it:
//! - [`ContinuousDecoder`]: push-based; follows the stream's own frame
//!   delivery and reports every attempt through a [`ResultCallback`]
//! - [`SampledDecoder`]: pull-based; snapshots a frame on a fixed tick into
//!   an off-screen buffer and runs a single-shot decode
//!
//! Both wrap a [`SingleShotDecoder`] (normally [`RqrrDecoder`]) and never run
//! two attempts on the same buffer at once.

mod cancel;
mod continuous;
mod grayscale;
mod rqrr_decoder;
mod sampled;

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::media::{Frame, MediaError, VideoStream};

pub use cancel::CancelToken;
pub use continuous::ContinuousDecoder;
pub use grayscale::to_luma_into;
pub use rqrr_decoder::RqrrDecoder;
pub use sampled::SampledDecoder;

/// Raw payload of a decoded QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: Vec<u8>,
    /// When the decoder produced the payload
    pub timestamp: SystemTime,
}

impl Decoded {
    /// Wrap a payload, stamped with the current time.
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            timestamp: SystemTime::now(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

/// Options for a single decode attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Retry on the inverted image (light modules on a dark background)
    pub try_inverted: bool,
}

/// Why one decode attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("QR code found but unreadable: {0}")]
    Unreadable(String),

    #[error("Decoder unavailable: {0}")]
    Unavailable(String),

    #[error("Frame grab failed: {0}")]
    Stream(#[from] MediaError),
}

impl DecodeError {
    /// Whether the failure came from the stream being torn down.
    ///
    /// Every other decode error is transient.
    pub fn is_teardown(&self) -> bool {
        matches!(self, DecodeError::Stream(MediaError::StreamEnded))
    }
}

/// A function that finds a QR code in one luma image.
pub trait SingleShotDecoder: Send + 'static {
    /// Decode `luma` (`width * height` bytes, one per pixel).
    ///
    /// Returns `Ok(None)` when the image holds no QR code.
    fn decode(
        &mut self,
        luma: &[u8],
        width: usize,
        height: usize,
        options: &DecodeOptions,
    ) -> Result<Option<Decoded>, DecodeError>;
}

/// Called once per decode attempt with either a payload, an error, or
/// neither (no code in the frame).
pub type ResultCallback = Arc<dyn Fn(Option<Decoded>, Option<DecodeError>) + Send + Sync>;

/// Handle on a running decode loop.
#[derive(Debug)]
pub struct DecodeControls {
    cancel: CancelToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl DecodeControls {
    pub fn new(cancel: CancelToken, task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop scheduling attempts. An attempt already running finishes, but
    /// its outcome is not reported.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the loop task to exit.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// The decode capability the session controller is polymorphic over.
pub trait FrameDecoder: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Start decoding frames from `stream`.
    ///
    /// Attempts stop once `cancel` fires or a code has been reported.
    /// Must be called from within a tokio runtime.
    fn begin(
        &self,
        stream: Arc<dyn VideoStream>,
        cancel: CancelToken,
        on_result: ResultCallback,
    ) -> DecodeControls;
}

/// A single-shot decoder together with its off-screen luma buffer.
///
/// Lives behind a mutex so only one attempt uses the buffer at a time.
pub(crate) struct Workspace<D> {
    decoder: D,
    luma: Vec<u8>,
    options: DecodeOptions,
}

pub(crate) type SharedWorkspace<D> = Arc<Mutex<Workspace<D>>>;

pub(crate) fn workspace<D: SingleShotDecoder>(decoder: D, options: DecodeOptions) -> SharedWorkspace<D> {
    Arc::new(Mutex::new(Workspace {
        decoder,
        luma: Vec::new(),
        options,
    }))
}

/// Copy `frame` into the workspace buffer and decode it on the blocking pool.
pub(crate) async fn decode_frame<D: SingleShotDecoder>(
    workspace: &SharedWorkspace<D>,
    frame: Frame,
) -> Result<Option<Decoded>, DecodeError> {
    if !frame.is_well_formed() {
        return Err(DecodeError::MalformedFrame(format!(
            "{} bytes for a {}x{} frame",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    let workspace = Arc::clone(workspace);
    tokio::task::spawn_blocking(move || {
        let mut guard = workspace
            .lock()
            .map_err(|_| DecodeError::Unavailable("decoder poisoned by a panic".to_string()))?;
        let Workspace {
            decoder,
            luma,
            options,
        } = &mut *guard;
        to_luma_into(&frame, luma);
        decoder.decode(luma, frame.width as usize, frame.height as usize, options)
    })
    .await
    .map_err(|e| DecodeError::Unavailable(e.to_string()))?
}

/// Wait for the next frame unless cancelled first.
pub(crate) async fn next_frame_or_cancel(
    stream: &dyn VideoStream,
    cancel: &CancelToken,
) -> Option<Result<Frame, MediaError>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        frame = stream.next_frame() => Some(frame),
    }
}

/// Sleep unless cancelled first. Returns `false` when cancelled.
pub(crate) async fn pause_or_cancel(duration: std::time::Duration, cancel: &CancelToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => !cancel.is_cancelled(),
    }
}

/// Report one attempt's outcome. Returns `true` when the loop should end.
pub(crate) fn report(
    on_result: &ResultCallback,
    cancel: &CancelToken,
    outcome: Result<Option<Decoded>, DecodeError>,
) -> bool {
    // a stop that landed mid-attempt wins over the attempt's outcome
    if cancel.is_cancelled() {
        return true;
    }
    match outcome {
        Ok(Some(decoded)) => {
            on_result(Some(decoded), None);
            true
        }
        Ok(None) => {
            on_result(None, None);
            false
        }
        Err(e) => {
            let teardown = e.is_teardown();
            on_result(None, Some(e));
            teardown
        }
    }
}
