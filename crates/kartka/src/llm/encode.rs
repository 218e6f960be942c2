//! Inline image encoding for model requests.

use std::io::Cursor;

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::{KartkaError, Result};

/// JPEG quality for images sent to the model.
pub const REQUEST_JPEG_QUALITY: u8 = 92;

/// Encode `image` as JPEG bytes at `quality`.
pub fn jpeg_bytes(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| KartkaError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Encode `image` as a `data:image/jpeg;base64,...` URL.
pub fn jpeg_data_url(image: &DynamicImage) -> Result<String> {
    let bytes = jpeg_bytes(image, REQUEST_JPEG_QUALITY)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/jpeg;base64,{b64}"))
}
