//! Format-negotiated encoding.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::imaging::fallback::blank_image;
use crate::imaging::ImagingError;

/// Output formats the service negotiates via `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Avif,
    Webp,
    Png,
}

impl OutputFormat {
    /// Pick the preferred format from an `Accept` header. AVIF compresses
    /// best, so it wins when the client advertises it.
    pub fn from_accept(accept: &str) -> Self {
        let accept = accept.to_ascii_lowercase();
        if accept.contains("image/avif") {
            OutputFormat::Avif
        } else if accept.contains("image/webp") {
            OutputFormat::Webp
        } else {
            OutputFormat::Png
        }
    }

    /// Stable token used in derived cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Avif => "image/avif",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Png => "image/png",
        }
    }
}

/// Encode in the requested format, degrading AVIF → WebP → PNG and finally
/// to a 1x1 white PNG. Never fails: the returned bytes are always a valid
/// image and the returned MIME always matches them.
pub fn encode(img: &DynamicImage, format: OutputFormat) -> (Vec<u8>, &'static str) {
    if format == OutputFormat::Avif {
        match encode_avif(img, 75) {
            Ok(bytes) if !bytes.is_empty() => return (bytes, "image/avif"),
            Ok(_) | Err(_) => {}
        }
    }
    if matches!(format, OutputFormat::Avif | OutputFormat::Webp) {
        match encode_webp(img) {
            Ok(bytes) if !bytes.is_empty() => return (bytes, "image/webp"),
            Ok(_) | Err(_) => {}
        }
    }

    match encode_png(img) {
        Ok(bytes) => (bytes, "image/png"),
        Err(e) => {
            tracing::warn!(error = %e, "png encode failed, serving blank pixel");
            let blank = encode_png(&blank_image()).unwrap_or_default();
            (blank, "image/png")
        }
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(buf)
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    use image::codecs::webp::WebPEncoder;

    let rgba = img.to_rgba8();
    let mut buf = Vec::new();
    // The encoder is lossless-only; icon-sized output stays small anyway.
    WebPEncoder::new_lossless(&mut buf)
        .encode(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(feature = "avif")]
fn encode_avif(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    use image::codecs::avif::AvifEncoder;
    use image::ImageEncoder;

    let quality = quality.clamp(1, 100);
    let rgba = img.to_rgba8();
    let mut buf = Vec::new();
    // Speed 6 trades a little density for encode latency we can afford
    // per-request; the encoder subsamples chroma itself.
    AvifEncoder::new_with_speed_quality(&mut buf, 6, quality)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(not(feature = "avif"))]
fn encode_avif(_img: &DynamicImage, _quality: u8) -> Result<Vec<u8>, ImagingError> {
    Err(ImagingError::Encode("avif encoder disabled".into()))
}
