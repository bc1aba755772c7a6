use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Raster width SVG logos are rendered at before scaling onto the canvas.
pub const SVG_LOGO_RASTER_WIDTH: u32 = 512;

/// Decoded image as premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed premultiplied RGBA8 pixels.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decode encoded raster image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> ReelResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Decode a logo, accepting raster formats and SVG.
pub fn decode_logo(bytes: &[u8]) -> ReelResult<DecodedImage> {
    if looks_like_svg(bytes) {
        let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())
            .context("parse svg logo")?;
        return rasterize_svg(&tree, SVG_LOGO_RASTER_WIDTH);
    }
    decode_image(bytes)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn rasterize_svg(tree: &usvg::Tree, width: u32) -> ReelResult<DecodedImage> {
    let size = tree.size();
    if !(size.width().is_finite() && size.height().is_finite())
        || size.width() <= 0.0
        || size.height() <= 0.0
    {
        return Err(ReelError::decode("svg has invalid width/height"));
    }
    let scale = width as f32 / size.width();
    let height = ((size.height() * scale).ceil() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ReelError::decode("failed to allocate svg pixmap"))?;
    let xform = resvg::tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(tree, xform, &mut pixmap.as_mut());

    // tiny-skia pixmaps are already premultiplied RGBA8.
    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(pixmap.data().to_vec()),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
