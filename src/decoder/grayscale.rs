//! RGB to luma conversion for the decoder's off-screen buffer.

use crate::media::Frame;

/// Convert an RGB frame to luma, reusing an existing buffer.
///
/// Uses the ITU-R BT.601 weights with integer math; the coefficients are
/// scaled by 1000 (299 + 587 + 114 = 1000). The buffer is cleared first, so
/// repeated calls never reallocate once it has grown to frame size.
///
/// # Returns
/// The number of pixels written to the buffer
pub fn to_luma_into(frame: &Frame, buffer: &mut Vec<u8>) -> usize {
    let pixel_count = frame.pixel_count();
    buffer.clear();
    buffer.reserve(pixel_count);

    for rgb in frame.data.chunks_exact(frame.bytes_per_pixel()).take(pixel_count) {
        let r = rgb[0] as u32;
        let g = rgb[1] as u32;
        let b = rgb[2] as u32;
        let luminance = (299 * r + 587 * g + 114 * b) / 1000;
        buffer.push(luminance as u8);
    }

    buffer.len()
}

/// Write the inverse of `luma` into `out`, for light-on-dark codes.
pub fn invert_into(luma: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(luma.iter().map(|v| 255 - v));
}
