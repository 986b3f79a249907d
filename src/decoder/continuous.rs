//! Push-based decoding driven by the stream's own frame delivery.

use std::sync::Arc;
use std::time::Duration;

use super::{
    decode_frame, next_frame_or_cancel, pause_or_cancel, report, workspace, CancelToken,
    DecodeControls, DecodeOptions, FrameDecoder, ResultCallback, SharedWorkspace,
    SingleShotDecoder,
};
use crate::media::VideoStream;

/// Default pause between two decode attempts.
pub const DEFAULT_ATTEMPT_DELAY: Duration = Duration::from_millis(500);

/// Decodes every frame the stream delivers, pausing between attempts, and
/// reports each attempt through the callback.
pub struct ContinuousDecoder<D> {
    workspace: SharedWorkspace<D>,
    attempt_delay: Duration,
}

impl<D: SingleShotDecoder> ContinuousDecoder<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_options(decoder, DecodeOptions::default(), DEFAULT_ATTEMPT_DELAY)
    }

    pub fn with_options(decoder: D, options: DecodeOptions, attempt_delay: Duration) -> Self {
        Self {
            workspace: workspace(decoder, options),
            attempt_delay,
        }
    }

    /// Decode `stream` until stopped, calling `on_result` after every
    /// attempt. The returned controls stop the loop.
    pub fn decode_from_stream(
        &self,
        stream: Arc<dyn VideoStream>,
        on_result: ResultCallback,
    ) -> DecodeControls {
        self.begin(stream, CancelToken::new(), on_result)
    }
}

impl<D: SingleShotDecoder> FrameDecoder for ContinuousDecoder<D> {
    fn name(&self) -> &'static str {
        "continuous"
    }

    fn begin(
        &self,
        stream: Arc<dyn VideoStream>,
        cancel: CancelToken,
        on_result: ResultCallback,
    ) -> DecodeControls {
        let workspace = Arc::clone(&self.workspace);
        let attempt_delay = self.attempt_delay;
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let cancel = loop_cancel;
            while !cancel.is_cancelled() {
                let outcome = match next_frame_or_cancel(stream.as_ref(), &cancel).await {
                    None => break,
                    Some(Ok(frame)) => decode_frame(&workspace, frame).await,
                    Some(Err(e)) => Err(e.into()),
                };
                if report(&on_result, &cancel, outcome) {
                    break;
                }
                if !pause_or_cancel(attempt_delay, &cancel).await {
                    break;
                }
            }
            log::debug!("Continuous decode loop on {} finished", stream.device_id());
        });

        DecodeControls::new(cancel, task)
    }
}
