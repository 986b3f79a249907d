//! Pull-based decoding: sample a frame on every tick.

use std::sync::Arc;
use std::time::Duration;

use super::{
    decode_frame, next_frame_or_cancel, pause_or_cancel, report, workspace, CancelToken,
    DecodeControls, DecodeOptions, FrameDecoder, ResultCallback, SharedWorkspace,
    SingleShotDecoder,
};
use crate::media::VideoStream;

/// Default tick, roughly one display refresh at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Samples the stream once per tick and runs a single-shot decode on the
/// snapshot.
///
/// The next tick is only scheduled after the current attempt finishes, so
/// attempts never overlap on the shared buffer.
pub struct SampledDecoder<D> {
    workspace: SharedWorkspace<D>,
    interval: Duration,
}

impl<D: SingleShotDecoder> SampledDecoder<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_options(decoder, DecodeOptions::default(), DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_options(decoder: D, options: DecodeOptions, interval: Duration) -> Self {
        Self {
            workspace: workspace(decoder, options),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<D: SingleShotDecoder> FrameDecoder for SampledDecoder<D> {
    fn name(&self) -> &'static str {
        "sampled"
    }

    fn begin(
        &self,
        stream: Arc<dyn VideoStream>,
        cancel: CancelToken,
        on_result: ResultCallback,
    ) -> DecodeControls {
        let workspace = Arc::clone(&self.workspace);
        let interval = self.interval;
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let cancel = loop_cancel;
            loop {
                if !pause_or_cancel(interval, &cancel).await {
                    break;
                }
                let outcome = match next_frame_or_cancel(stream.as_ref(), &cancel).await {
                    None => break,
                    Some(Ok(frame)) => decode_frame(&workspace, frame).await,
                    Some(Err(e)) => Err(e.into()),
                };
                if report(&on_result, &cancel, outcome) {
                    break;
                }
            }
            log::debug!("Sampled decode loop on {} finished", stream.device_id());
        });

        DecodeControls::new(cancel, task)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{payload, recorder, Scripted, TickingStream};
    use super::super::{DecodeError, Decoded};
    use super::*;
    use crate::media::MediaError;
    use std::sync::atomic::Ordering;

    fn decoder(outcomes: Vec<Result<Option<Decoded>, DecodeError>>) -> SampledDecoder<Scripted> {
        SampledDecoder::with_options(
            Scripted::new(outcomes),
            DecodeOptions::default(),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_stops_after_first_result() {
        let sampled = decoder(vec![Ok(None), Ok(Some(Decoded::from_text("HELLO")))]);
        let (callback, calls) = recorder();
        let controls = sampled.begin(TickingStream::new(), CancelToken::new(), callback);
        tokio::time::timeout(Duration::from_secs(2), controls.join())
            .await
            .expect("loop should end after a result");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(payload(&calls[1].0), Some(b"HELLO".as_slice()));
    }

    #[tokio::test]
    async fn test_transient_errors_keep_looping_until_stopped() {
        let errors = (0..1000)
            .map(|_| Err(DecodeError::Unreadable("bad".to_string())))
            .collect();
        let sampled = decoder(errors);
        let (callback, calls) = recorder();
        let stream = TickingStream::new();
        let controls = sampled.begin(stream.clone(), CancelToken::new(), callback);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!controls.is_stopped());
        controls.stop();
        tokio::time::timeout(Duration::from_secs(2), controls.join())
            .await
            .expect("loop should honour stop");

        let seen = calls.lock().unwrap().len();
        assert!(seen >= 2, "expected several attempts, saw {}", seen);
        assert!(calls.lock().unwrap().iter().all(|(d, e)| d.is_none() && e.is_some()));
    }

    #[tokio::test]
    async fn test_stream_teardown_ends_loop() {
        let sampled = decoder(vec![]);
        let (callback, calls) = recorder();
        let stream = TickingStream::new();
        stream.stop_tracks();
        let controls = sampled.begin(stream, CancelToken::new(), callback);
        tokio::time::timeout(Duration::from_secs(2), controls.join())
            .await
            .expect("teardown should end the loop");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].1,
            Some(DecodeError::Stream(MediaError::StreamEnded))
        );
    }

    #[tokio::test]
    async fn test_attempts_never_overlap() {
        let scripted = Scripted::new(vec![]);
        let max_in_flight = Arc::clone(&scripted.max_in_flight);
        let sampled =
            SampledDecoder::with_options(scripted, DecodeOptions::default(), Duration::ZERO);
        let (callback, _calls) = recorder();
        let controls = sampled.begin(TickingStream::new(), CancelToken::new(), callback);

        tokio::time::sleep(Duration::from_millis(30)).await;
        controls.stop();
        controls.join().await;
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_begin_never_decodes() {
        let sampled = decoder(vec![Ok(Some(Decoded::from_text("X")))]);
        let (callback, calls) = recorder();
        let cancel = CancelToken::new();
        cancel.cancel();
        let stream = TickingStream::new();
        sampled.begin(stream.clone(), cancel, callback).join().await;
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(stream.frames.load(Ordering::SeqCst), 0);
    }
}
