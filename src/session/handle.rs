//! Exclusive ownership of a running camera stream and its decode loop.

use std::sync::Arc;

use crate::decoder::DecodeControls;
use crate::media::{MediaError, MediaSource, VideoStream};

/// The stream and loop controls of a scanning session.
///
/// Releasing consumes the handle, so a session releases its camera at most
/// once.
pub(crate) struct DecoderHandle {
    stream: Arc<dyn VideoStream>,
    controls: DecodeControls,
}

impl DecoderHandle {
    pub(crate) fn new(stream: Arc<dyn VideoStream>, controls: DecodeControls) -> Self {
        Self { stream, controls }
    }

    pub(crate) fn device_id(&self) -> &str {
        self.stream.device_id()
    }

    /// Stop the decode loop, then hand the stream back to `media`.
    pub(crate) fn release(self, media: &dyn MediaSource) -> Result<(), MediaError> {
        self.controls.stop();
        media.release(self.stream)
    }
}
