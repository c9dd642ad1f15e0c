use crate::error::{AnnotateError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

static DATA_URI_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/([A-Za-z0-9.+-]+);base64$").unwrap());

/// Split `data:image/<fmt>;base64,<payload>` into the declared subtype and
/// the raw payload bytes.
pub fn split_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let (header, payload) = uri
        .trim()
        .split_once(',')
        .ok_or_else(|| AnnotateError::Decode("data URI has no ',' separator".to_string()))?;
    let caps = DATA_URI_HEADER_RE
        .captures(header)
        .ok_or_else(|| AnnotateError::Decode(format!("unsupported data URI header '{header}'")))?;
    let subtype = caps[1].to_ascii_lowercase();
    let compact: String = payload.split_ascii_whitespace().collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|err| AnnotateError::Decode(format!("invalid base64 payload: {err}")))?;
    Ok((subtype, bytes))
}

/// Decode a data URI into an RGB raster.
pub fn decode_data_uri(uri: &str) -> Result<RgbImage> {
    let (subtype, bytes) = split_data_uri(uri)?;
    let declared = ImageFormat::from_mime_type(format!("image/{subtype}"));
    let decoded = match declared {
        Some(format) => image::load_from_memory_with_format(&bytes, format)
            .or_else(|_| image::load_from_memory(&bytes)),
        None => image::load_from_memory(&bytes),
    }
    .map_err(|err| AnnotateError::Decode(format!("image/{subtype}: {err}")))?;
    log::debug!(
        "decoded image/{} raster {}x{}",
        subtype,
        decoded.width(),
        decoded.height()
    );
    Ok(decoded.to_rgb8())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| AnnotateError::Encode(err.to_string()))?;
    Ok(buffer.into_inner())
}

pub fn encode_png_data_uri(image: &RgbImage) -> Result<String> {
    let bytes = encode_png(image)?;
    Ok(format!("{PNG_DATA_URI_PREFIX}{}", BASE64.encode(bytes)))
}
