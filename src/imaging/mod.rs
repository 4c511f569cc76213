//! Image decode, rasterize, resize and encode.
//!
//! # Responsibilities
//! - Decode raster candidates (PNG, JPEG, GIF, WebP, AVIF)
//! - Pick the best entry out of ICO containers
//! - Rasterize SVG candidates at the target size
//! - Reject degenerate output (all-transparent, all-black/white)
//! - Resize and encode in the negotiated format
//! - Provide the deterministic fallback globe
//!
//! # Design Decisions
//! - Everything here is total from the handler's point of view: decoders
//!   return errors that mean "skip this candidate", encoders degrade
//!   through WebP and PNG down to a 1x1 white pixel
//! - Adversarial input is expected; nothing in this module trusts declared
//!   dimensions, entry offsets or byte counts

pub mod decode;
pub mod encode;
pub mod fallback;
pub mod ico;
pub mod quality;
pub mod svg;

pub use decode::decode_raster;
pub use encode::{encode, OutputFormat};
pub use fallback::{blank_image, fallback_image};
pub use ico::decode_ico;
pub use quality::{nearly_blank, nearly_blank_or_black};
pub use svg::rasterize_svg;

use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("unsupported raster format")]
    UnsupportedFormat,

    #[error("malformed ico: {0}")]
    IcoMalformed(String),

    #[error("svg parse failed: {0}")]
    SvgParse(String),

    #[error("svg render failed: {0}")]
    SvgRender(String),

    #[error("svg rendered blank or black")]
    BlankSvg,

    #[error("encode failed: {0}")]
    Encode(String),
}

/// Resize to an exact square. Catmull-Rom keeps icon edges visibly sharper
/// than bilinear at small sizes.
pub fn resize_to(img: &DynamicImage, size: u32) -> DynamicImage {
    img.resize_exact(size, size, FilterType::CatmullRom)
}
