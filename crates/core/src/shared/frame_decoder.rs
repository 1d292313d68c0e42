use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty frame payload")]
    Empty,
    #[error("payload is not valid base64: {0}")]
    Base64(#[source] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Image(#[source] image::ImageError),
}

/// Decode an encoded frame payload into an RGB [`Frame`].
///
/// Browser capture payloads arrive as data URLs
/// (`data:image/jpeg;base64,...`); everything up to and including the first
/// comma is stripped before base64 decoding. Bare base64 payloads are
/// accepted as-is.
pub fn decode_frame(payload: &str) -> Result<Frame, DecodeError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.find(',') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(encoded).map_err(DecodeError::Base64)?;
    let rgb = image::load_from_memory(&bytes)
        .map_err(DecodeError::Image)?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(rgb.into_raw(), width, height, 3))
}
