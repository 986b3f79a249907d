//! Single-shot decoding with rqrr.

use super::grayscale::invert_into;
use super::{DecodeError, DecodeOptions, Decoded, SingleShotDecoder};

/// Finds and decodes QR codes in a luma image using `rqrr`.
///
/// Keeps a scratch buffer for the inverted retry so repeated calls do not
/// allocate per frame.
#[derive(Debug, Default)]
pub struct RqrrDecoder {
    inverted: Vec<u8>,
}

impl RqrrDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Try every grid rqrr detects; the first clean decode wins.
fn decode_grids(luma: &[u8], width: usize, height: usize) -> Result<Option<Decoded>, DecodeError> {
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
    let grids = prepared.detect_grids();

    let mut last_error = None;
    for grid in grids {
        let mut payload = Vec::new();
        match grid.decode_to(&mut payload) {
            Ok(_meta) => return Ok(Some(Decoded::new(payload))),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(DecodeError::Unreadable(e.to_string())),
        None => Ok(None),
    }
}

impl SingleShotDecoder for RqrrDecoder {
    fn decode(
        &mut self,
        luma: &[u8],
        width: usize,
        height: usize,
        options: &DecodeOptions,
    ) -> Result<Option<Decoded>, DecodeError> {
        if width == 0 || height == 0 || luma.len() != width * height {
            return Err(DecodeError::MalformedFrame(format!(
                "{} bytes for a {}x{} luma image",
                luma.len(),
                width,
                height
            )));
        }

        let first = decode_grids(luma, width, height);
        if !options.try_inverted || matches!(first, Ok(Some(_))) {
            return first;
        }

        invert_into(luma, &mut self.inverted);
        match decode_grids(&self.inverted, width, height) {
            Ok(Some(decoded)) => Ok(Some(decoded)),
            // report what the upright pass saw
            _ => first,
        }
    }
}
