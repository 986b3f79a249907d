//! Frame conversion utilities.

use nokhwa::pixel_format::RgbFormat;

use crate::media::Frame;

/// Convert a nokhwa buffer to an RGB [`Frame`].
///
/// Handles various camera formats (MJPEG, YUYV, NV12, etc.) by using
/// nokhwa's built-in decode_image which converts from the camera's native
/// format to RGB.
///
/// Returns `None` if the conversion fails (unsupported format or corrupt data).
pub fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    let frame = Frame::rgb(decoded.into_raw(), resolution.width(), resolution.height());
    frame.is_well_formed().then_some(frame)
}
