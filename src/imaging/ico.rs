//! ICO container handling.
//!
//! ICO files bundle several images; picking the right entry matters more
//! than decoding any of them. Entries are ranked PNG-before-BMP, then by
//! area, then by bit depth, and decoded in that order until one survives
//! the blank gate.

use image::{DynamicImage, ImageFormat};

use crate::imaging::quality::nearly_blank;
use crate::imaging::ImagingError;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug)]
struct DirEntry {
    width: u32,
    height: u32,
    bpp: u32,
    byte_size: usize,
    byte_offset: usize,
    is_png: bool,
}

/// Decode the best entry out of an ICO container.
pub fn decode_ico(data: &[u8]) -> Result<DynamicImage, ImagingError> {
    if data.len() < 6 {
        return Err(ImagingError::IcoMalformed("shorter than header".into()));
    }

    let icon_type = u16::from_le_bytes([data[2], data[3]]);
    let count = u16::from_le_bytes([data[4], data[5]]) as usize;
    if icon_type != 1 || count == 0 {
        return decode_with_library(data);
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let off = 6 + i * 16;
        let Some(e) = data.get(off..off + 16) else {
            break;
        };
        // Canonical 0 means 256 for both dimensions.
        let width = if e[0] == 0 { 256 } else { u32::from(e[0]) };
        let height = if e[1] == 0 { 256 } else { u32::from(e[1]) };
        // Unspecified bit depth is treated as 32 so such entries do not
        // lose the depth tiebreak for no reason.
        let bpp = if e[6] == 0 { 32 } else { u32::from(e[6]) };
        let byte_size = u32::from_le_bytes([e[8], e[9], e[10], e[11]]) as usize;
        let byte_offset = u32::from_le_bytes([e[12], e[13], e[14], e[15]]) as usize;
        entries.push(DirEntry {
            width,
            height,
            bpp,
            byte_size,
            byte_offset,
            is_png: false,
        });
    }

    if entries.is_empty() {
        return decode_with_library(data);
    }

    for entry in &mut entries {
        if let Some(slice) = entry_slice(data, entry) {
            entry.is_png = slice.len() >= 8 && slice[..8] == PNG_SIGNATURE;
        }
    }

    // PNG beats BMP, then larger area, then deeper color.
    entries.sort_by(|a, b| {
        b.is_png
            .cmp(&a.is_png)
            .then((b.width * b.height).cmp(&(a.width * a.height)))
            .then(b.bpp.cmp(&a.bpp))
    });

    for entry in &entries {
        let Some(slice) = entry_slice(data, entry) else {
            continue;
        };
        if entry.is_png {
            if let Ok(img) = image::load_from_memory_with_format(slice, ImageFormat::Png) {
                return Ok(img);
            }
        }
        if let Ok(img) = image::load_from_memory_with_format(slice, ImageFormat::Bmp) {
            // BMP-in-ICO alpha is frequently degenerate; a blank result
            // means the next entry is a better bet.
            if !nearly_blank(&img) {
                return Ok(img);
            }
        }
    }

    decode_with_library(data)
}

/// Entries whose declared slice runs past the file are discarded.
fn entry_slice<'a>(data: &'a [u8], entry: &DirEntry) -> Option<&'a [u8]> {
    if entry.byte_size == 0 {
        return None;
    }
    let end = entry.byte_offset.checked_add(entry.byte_size)?;
    data.get(entry.byte_offset..end)
}

fn decode_with_library(data: &[u8]) -> Result<DynamicImage, ImagingError> {
    image::load_from_memory_with_format(data, ImageFormat::Ico)
        .map_err(|e| ImagingError::IcoMalformed(e.to_string()))
}
