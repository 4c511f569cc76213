//! SVG rasterization.

use image::{DynamicImage, RgbaImage};
use resvg::{tiny_skia, usvg};

use crate::imaging::quality::nearly_blank_or_black;
use crate::imaging::ImagingError;

/// Rasterize SVG bytes to `width` x `height`, composited over white.
///
/// Input is preprocessed first: a missing `xmlns` is injected and literal
/// `currentColor` tokens become black (`currentColor` has no meaningful
/// value outside a host document). Output that fails the blank-or-black
/// gate is rejected so the caller moves on to the next candidate.
pub fn rasterize_svg(data: &[u8], width: u32, height: u32) -> Result<DynamicImage, ImagingError> {
    let text = String::from_utf8_lossy(data);
    let prepared = preprocess_svg(&text);

    let tree = usvg::Tree::from_str(&prepared, &usvg::Options::default())
        .map_err(|e| ImagingError::SvgParse(e.to_string()))?;

    let size = tree.size();
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ImagingError::SvgRender(format!("invalid canvas {width}x{height}")))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let scale_x = width as f32 / size.width();
    let scale_y = height as f32 / size.height();
    let transform = tiny_skia::Transform::from_scale(scale_x, scale_y);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let img = RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or_else(|| ImagingError::SvgRender("pixmap buffer mismatch".into()))?;
    let img = DynamicImage::ImageRgba8(img);

    if nearly_blank_or_black(&img) {
        return Err(ImagingError::BlankSvg);
    }
    Ok(img)
}

/// Fix the two SVG quirks that break rendering most often in the wild.
fn preprocess_svg(input: &str) -> String {
    let mut out = if !input.contains("xmlns") && input.contains("<svg") {
        input.replacen("<svg", r#"<svg xmlns="http://www.w3.org/2000/svg""#, 1)
    } else {
        input.to_string()
    };
    if out.contains("currentColor") {
        out = out.replace("currentColor", "#000000");
    }
    out
}
