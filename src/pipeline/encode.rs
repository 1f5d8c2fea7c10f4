//! Image encoding: `DynamicImage` → PNG bytes, PNG bytes → transport base64.
//!
//! PNG is lossless; text crispness matters far more than file size for OCR
//! and VLM accuracy. For transport every page is base64-encoded on its own
//! with the standard padded alphabet and no line wrapping. Consumers of the
//! tool response reject payloads with embedded newlines or bad padding, so
//! [`check_base64_payload`] is applied before anything leaves the crate.

use crate::error::Pdf2OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every encoded page.
pub const PNG_MIME: &str = "image/png";

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Base64-encode bytes for transport (standard alphabet, padded, unwrapped).
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Verify a transport payload: no whitespace, length divisible by 4,
/// decodes cleanly, and re-encodes to the identical string.
pub fn check_base64_payload(payload: &str) -> Result<(), Pdf2OcrError> {
    if let Some(pos) = payload.find(|c: char| c.is_ascii_whitespace()) {
        return Err(Pdf2OcrError::Internal(format!(
            "base64 payload contains whitespace at offset {pos}"
        )));
    }
    if payload.len() % 4 != 0 {
        return Err(Pdf2OcrError::Internal(format!(
            "base64 payload length {} is not a multiple of 4",
            payload.len()
        )));
    }
    let decoded = STANDARD
        .decode(payload)
        .map_err(|e| Pdf2OcrError::Internal(format!("base64 payload does not decode: {e}")))?;
    if STANDARD.encode(&decoded) != payload {
        return Err(Pdf2OcrError::Internal(
            "base64 payload is not canonical".into(),
        ));
    }
    Ok(())
}
