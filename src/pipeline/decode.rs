use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use image::RgbImage;
use thiserror::Error;

// Standard alphabet; trailing padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Cannot identify image: {0}")]
    Image(#[from] image::ImageError),
}

/// Drop a `data:<mime>;base64,` header. Everything after the first comma is
/// the payload.
pub fn strip_data_uri(input: &str) -> &str {
    match input.split_once(',') {
        Some((_, payload)) => payload,
        None => input,
    }
}

pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = strip_data_uri(input);
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(LENIENT.decode(compact)?)
}

/// Base64 (or data URI) string to an RGB pixel buffer.
pub fn decode_image(input: &str) -> Result<RgbImage, DecodeError> {
    let bytes = decode_base64(input)?;
    let img = image::load_from_memory(&bytes)?;
    Ok(img.to_rgb8())
}
