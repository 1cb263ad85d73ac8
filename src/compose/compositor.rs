//! Horizontal split compositing.
//!
//! The output canvas takes the top image's dimensions. Rows `[0, split)` come
//! from the top image and rows `[split, height)` from the bottom image at the
//! *same* row offset, so the bottom image is sampled from `split`, not from
//! its own row 0. Pixels are copied verbatim (no blending). Where the bottom
//! image is smaller than the canvas, the uncovered pixels stay transparent.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, RgbaImage};

use crate::compose::error::CompositeError;

const CHANNELS: usize = 4;

/// First canvas row taken from the bottom image: `floor(height * percent / 100)`.
pub fn split_row(height: u32, percent: u8) -> u32 {
    (u64::from(height) * u64::from(percent.min(100)) / 100) as u32
}

/// Build the composite canvas without encoding it.
pub fn composite_canvas(top: &RgbaImage, bottom: &RgbaImage, percent: u8) -> RgbaImage {
    let (width, height) = top.dimensions();
    let split = split_row(height, percent);
    let mut canvas = RgbaImage::new(width, height);

    let row_len = width as usize * CHANNELS;
    let canvas_raw: &mut [u8] = &mut canvas;

    let top_raw = top.as_raw();
    let top_end = split as usize * row_len;
    canvas_raw[..top_end].copy_from_slice(&top_raw[..top_end]);

    let (bottom_width, bottom_height) = bottom.dimensions();
    let copy_len = width.min(bottom_width) as usize * CHANNELS;
    let bottom_row_len = bottom_width as usize * CHANNELS;
    let bottom_raw = bottom.as_raw();
    for y in split..height.min(bottom_height) {
        let dst = y as usize * row_len;
        let src = y as usize * bottom_row_len;
        canvas_raw[dst..dst + copy_len].copy_from_slice(&bottom_raw[src..src + copy_len]);
    }

    canvas
}

/// Encode a canvas as PNG into memory.
pub fn encode_png(canvas: &RgbaImage) -> Result<Bytes, CompositeError> {
    let mut buf = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CompositeError::Encode(Arc::new(e)))?;
    Ok(Bytes::from(buf))
}

/// Composite `top` over `bottom` at `percent` and encode the result.
pub fn composite(top: &RgbaImage, bottom: &RgbaImage, percent: u8) -> Result<Bytes, CompositeError> {
    encode_png(&composite_canvas(top, bottom, percent))
}
