//! Raster decoding.
//!
//! Candidates arrive with unreliable content types, so decoding is a
//! try-in-order ladder rather than a dispatch on the declared format.

use image::{DynamicImage, ImageFormat};

use crate::imaging::ImagingError;

/// Decode a non-ICO, non-SVG body. Tries PNG, JPEG, GIF, WebP and AVIF in
/// that order; the first decoder that accepts the bytes wins.
pub fn decode_raster(data: &[u8]) -> Result<DynamicImage, ImagingError> {
    for format in [
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::Gif,
        ImageFormat::WebP,
    ] {
        if let Ok(img) = image::load_from_memory_with_format(data, format) {
            return Ok(img);
        }
    }
    if let Ok(img) = decode_avif(data) {
        return Ok(img);
    }
    Err(ImagingError::UnsupportedFormat)
}

#[cfg(feature = "avif")]
fn decode_avif(data: &[u8]) -> Result<DynamicImage, ImagingError> {
    use avif_decode::{Decoder, Image};

    let decoded = Decoder::from_avif(data)
        .map_err(|_| ImagingError::UnsupportedFormat)?
        .to_image()
        .map_err(|_| ImagingError::UnsupportedFormat)?;

    let img = match decoded {
        Image::Rgb8(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let mut buf = Vec::with_capacity(img.width() * img.height() * 3);
            for px in img.buf() {
                buf.extend_from_slice(&[px.r, px.g, px.b]);
            }
            image::RgbImage::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
        Image::Rgba8(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let mut buf = Vec::with_capacity(img.width() * img.height() * 4);
            for px in img.buf() {
                buf.extend_from_slice(&[px.r, px.g, px.b, px.a]);
            }
            image::RgbaImage::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
        Image::Rgb16(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let mut buf = Vec::with_capacity(img.width() * img.height() * 3);
            for px in img.buf() {
                buf.extend_from_slice(&[px.r, px.g, px.b]);
            }
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgb16)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
        Image::Rgba16(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let mut buf = Vec::with_capacity(img.width() * img.height() * 4);
            for px in img.buf() {
                buf.extend_from_slice(&[px.r, px.g, px.b, px.a]);
            }
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgba16)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
        Image::Gray8(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let buf: Vec<u8> = img.buf().iter().map(|px| px.value()).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
        Image::Gray16(img) => {
            let (w, h) = (img.width() as u32, img.height() as u32);
            let buf: Vec<u16> = img.buf().iter().map(|px| px.value()).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageLuma16)
                .ok_or(ImagingError::UnsupportedFormat)?
        }
    };
    Ok(img)
}

#[cfg(not(feature = "avif"))]
fn decode_avif(_data: &[u8]) -> Result<DynamicImage, ImagingError> {
    Err(ImagingError::UnsupportedFormat)
}
