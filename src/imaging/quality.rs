//! Degenerate-image gates.
//!
//! Cheap sampled probes, not full scans: a 16x16 grid is enough to tell an
//! all-transparent BMP or an all-black SVG render from a real icon.

use image::{DynamicImage, GenericImageView};

const GRID: u32 = 16;

fn grid_step(dim: u32) -> u32 {
    (dim / GRID).max(1)
}

/// True when the image is (nearly) fully transparent. BMP entries inside
/// ICO files frequently decode with a degenerate alpha channel.
pub fn nearly_blank(img: &DynamicImage) -> bool {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return true;
    }
    let (step_x, step_y) = (grid_step(w), grid_step(h));

    let mut non_transparent = 0u32;
    let mut y = 0;
    while y < h {
        let mut x = 0;
        while x < w {
            let alpha = img.get_pixel(x, y).0[3];
            // Compare on the 16-bit scale: anything past one 8-bit step counts.
            if u32::from(alpha) * 257 > 0x0100 {
                non_transparent += 1;
                if non_transparent > 8 {
                    return false;
                }
            }
            x += step_x;
        }
        y += step_y;
    }
    true
}

/// True when the image is (nearly) all transparent, black or white. SVG
/// renderers that lose colors usually emit exactly those.
pub fn nearly_blank_or_black(img: &DynamicImage) -> bool {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return true;
    }
    let (step_x, step_y) = (grid_step(w), grid_step(h));

    let mut colored = 0u32;
    let mut y = 0;
    while y < h {
        let mut x = 0;
        while x < w {
            let [r, g, b, a] = img.get_pixel(x, y).0;
            x += step_x;
            // Skip mostly-transparent pixels.
            if u32::from(a) * 257 < 0x8000 {
                continue;
            }
            let is_black = r < 10 && g < 10 && b < 10;
            let is_white = r > 245 && g > 245 && b > 245;
            if !is_black && !is_white {
                colored += 1;
                if colored > 5 {
                    return false;
                }
            }
        }
        y += step_y;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, px: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(px)))
    }

    #[test]
    fn transparent_image_is_blank() {
        assert!(nearly_blank(&solid(32, 32, [0, 0, 0, 0])));
    }

    #[test]
    fn opaque_image_is_not_blank() {
        assert!(!nearly_blank(&solid(32, 32, [40, 90, 200, 255])));
        // Even an opaque black icon counts as content for the blank gate.
        assert!(!nearly_blank(&solid(32, 32, [0, 0, 0, 255])));
    }

    #[test]
    fn tiny_images_are_sampled_fully() {
        assert!(nearly_blank(&solid(2, 2, [0, 0, 0, 0])));
        assert!(!nearly_blank_or_black(&solid(8, 8, [40, 90, 200, 255])));
    }

    #[test]
    fn black_white_and_transparent_are_degenerate() {
        assert!(nearly_blank_or_black(&solid(64, 64, [0, 0, 0, 255])));
        assert!(nearly_blank_or_black(&solid(64, 64, [255, 255, 255, 255])));
        assert!(nearly_blank_or_black(&solid(64, 64, [120, 120, 120, 10])));
    }

    #[test]
    fn colored_image_is_not_degenerate() {
        assert!(!nearly_blank_or_black(&solid(64, 64, [30, 140, 220, 255])));
    }

    #[test]
    fn sparse_color_stays_degenerate() {
        // A few colored pixels on a white field stay under the threshold.
        let mut img = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
        for x in 0..3 {
            img.put_pixel(x * 4, 0, Rgba([200, 30, 30, 255]));
        }
        assert!(nearly_blank_or_black(&DynamicImage::ImageRgba8(img)));
    }
}
