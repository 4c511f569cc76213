//! The deterministic fallback icon.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::imaging::svg::rasterize_svg;

/// A light-blue globe on white, served whenever the pipeline cannot produce
/// a real icon.
pub const FALLBACK_GLOBE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100">
  <rect width="100" height="100" fill="white"/>
  <circle cx="50" cy="50" r="45" fill="#e3f2fd" stroke="#1976d2" stroke-width="2"/>
  <ellipse cx="50" cy="50" rx="45" ry="20" fill="none" stroke="#1976d2" stroke-width="1"/>
  <ellipse cx="50" cy="50" rx="20" ry="45" fill="none" stroke="#1976d2" stroke-width="1"/>
  <line x1="5" y1="50" x2="95" y2="50" stroke="#1976d2" stroke-width="1"/>
  <line x1="50" y1="5" x2="50" y2="95" stroke="#1976d2" stroke-width="1"/>
  <path d="M15 35 Q50 25 85 35" fill="none" stroke="#4caf50" stroke-width="2"/>
  <path d="M10 65 Q50 75 90 65" fill="none" stroke="#4caf50" stroke-width="2"/>
</svg>"##;

/// Rasterize the fallback globe at the requested size. If even that fails,
/// a 1x1 white pixel keeps the response an image — this function cannot
/// fail.
pub fn fallback_image(size: u32) -> DynamicImage {
    match rasterize_svg(FALLBACK_GLOBE_SVG.as_bytes(), size, size) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!(error = %e, "fallback globe failed to rasterize");
            blank_image()
        }
    }
}

/// A 1x1 opaque white image, the last resort of the encode path.
pub fn blank_image() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255])))
}
