//! Band encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG is lossless, and handwriting strokes are thin: JPEG ringing around
//! pen lines is enough to turn a `1` into a `7`. `detail: "high"` asks
//! GPT-4-class models for full tiling instead of a single downscaled overview.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode an image into raw bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a band as a base64 PNG ready for the vision API.
pub fn encode_band(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(png_bytes(img)?);
    debug!(
        "Encoded {}x{} band → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
