use std::sync::Arc;

use crate::foundation::core::Rgba8;
use crate::foundation::error::{ReelError, ReelResult};

/// Brush type carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Measures the advance width of a single unbroken line of text.
pub trait TextMeasure {
    /// Width in pixels of `text` set at `size_px`.
    fn advance(&mut self, text: &str, size_px: f32) -> ReelResult<f32>;
}

/// Parley-backed shaping with a single font loaded from bytes.
///
/// The font is registered on first use, so a compositor that never draws text never needs a
/// valid font.
pub struct TextLayoutEngine {
    font_bytes: Arc<Vec<u8>>,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: Option<String>,
}

impl TextLayoutEngine {
    /// Construct a new layout engine over `font_bytes`.
    pub fn new(font_bytes: Arc<Vec<u8>>) -> Self {
        Self {
            font_bytes,
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            family_name: None,
        }
    }

    /// Font bytes shared with the rasterizer.
    pub fn font_bytes(&self) -> &Arc<Vec<u8>> {
        &self.font_bytes
    }

    fn family(&mut self) -> ReelResult<String> {
        if let Some(name) = &self.family_name {
            return Ok(name.clone());
        }
        let families = self.font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(self.font_bytes.as_ref().clone()),
            None,
        );
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ReelError::render("no font families registered from font bytes"))?;
        let name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::render("registered font family has no name"))?
            .to_string();
        self.family_name = Some(name.clone());
        Ok(name)
    }

    /// Shape one line of text without wrapping.
    pub fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> ReelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation("text size_px must be finite and > 0"));
        }
        let family_name = self.family()?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

impl TextMeasure for TextLayoutEngine {
    fn advance(&mut self, text: &str, size_px: f32) -> ReelResult<f32> {
        if text.is_empty() {
            return Ok(0.0);
        }
        Ok(self
            .layout_line(text, size_px, TextBrushRgba8::default())?
            .width())
    }
}

/// Font-free measurer that assumes every character advances by a fixed fraction of the size.
///
/// Used when no font is configured so layout stays deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApproxMeasure {
    /// Advance per character, in ems.
    pub em_per_char: f32,
}

impl Default for ApproxMeasure {
    fn default() -> Self {
        Self { em_per_char: 0.55 }
    }
}

impl TextMeasure for ApproxMeasure {
    fn advance(&mut self, text: &str, size_px: f32) -> ReelResult<f32> {
        Ok(text.chars().count() as f32 * size_px * self.em_per_char)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
pub(crate) mod tests;
