//! Conversion between a flattened surface and its data URI form.
//!
//! The encoded string is what crosses every boundary: it is stored in
//! inspection records, embedded in printed documents and handed to the
//! editor as a prior annotation. Surfaces are encoded as JPEG so the inline
//! payload stays small; decoding accepts anything the `image` crate can sniff.

use std::fmt;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};

pub const ENCODED_MIME: &str = "image/jpeg";

/// Quality used when the caller has no preference.
pub const DEFAULT_QUALITY: f32 = 0.8;

const BASE64_MARKER: &str = ";base64,";

/// A flattened surface as `data:<mime>;base64,<payload>`.
///
/// Immutable once produced; every save creates a new one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedAnnotation(String);

impl EncodedAnnotation {
    /// Validate the data URI shape without decoding the image.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        split_data_uri(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime(&self) -> &str {
        split_data_uri(&self.0).map(|(mime, _)| mime).unwrap_or_default()
    }

    /// Raw image bytes carried in the payload.
    pub fn image_bytes(&self) -> Result<Vec<u8>> {
        let (_, payload) = split_data_uri(&self.0)?;
        STANDARD
            .decode(payload)
            .map_err(|e| AnnotateError::Decode(format!("invalid base64 payload: {e}")))
    }
}

impl fmt::Display for EncodedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EncodedAnnotation {
    type Error = AnnotateError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<EncodedAnnotation> for String {
    fn from(value: EncodedAnnotation) -> Self {
        value.0
    }
}

fn split_data_uri(value: &str) -> Result<(&str, &str)> {
    let rest = value
        .strip_prefix("data:")
        .ok_or_else(|| AnnotateError::Decode("missing data: prefix".into()))?;
    let (mime, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| AnnotateError::Decode("missing ;base64, marker".into()))?;
    if !mime.starts_with("image/") {
        return Err(AnnotateError::Decode(format!("unsupported mime type {mime:?}")));
    }
    if payload.is_empty() {
        return Err(AnnotateError::Decode("empty payload".into()));
    }
    Ok((mime, payload))
}

/// Map a 0..=1 quality onto the JPEG encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_nan() { DEFAULT_QUALITY } else { quality };
    (q.clamp(0.0, 1.0) * 99.0).round() as u8 + 1
}

/// Encode a surface as a JPEG data URI.
///
/// JPEG has no alpha channel, so translucent pixels are flattened onto white.
pub fn encode(surface: &RgbaImage, quality: f32) -> Result<EncodedAnnotation> {
    let rgb = flatten_onto_white(surface);
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| AnnotateError::Encode(e.to_string()))?;

    let payload = STANDARD.encode(buffer.into_inner());
    Ok(EncodedAnnotation(format!(
        "data:{ENCODED_MIME}{BASE64_MARKER}{payload}"
    )))
}

/// Decode an annotation into RGBA pixels.
///
/// Image decoding runs on the blocking pool; the returned future is the
/// completion signal callers wait on before painting.
pub async fn decode(encoded: &EncodedAnnotation) -> Result<RgbaImage> {
    let bytes = encoded.image_bytes()?;
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|e| AnnotateError::Decode(format!("decode task failed: {e}")))?
}

pub(crate) fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| AnnotateError::Decode(e.to_string()))
}

fn flatten_onto_white(surface: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(surface.width(), surface.height(), |x, y| {
        let [r, g, b, a] = surface.get_pixel(x, y).0;
        let alpha = a as u32;
        let over = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([over(r), over(g), over(b)])
    })
}
