//! Resolution-independent frame geometry.
//!
//! All sizes are multiples of a base unit equal to `target.width / 1080`, so a layout computed for
//! the preview canvas and one computed for a 4K export differ only by scale.

use crate::foundation::core::{Canvas, Point, Rect};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::text::TextMeasure;

/// Reference width the base unit is defined against.
pub const REFERENCE_WIDTH: f64 = 1080.0;

/// Fraction of canvas width the logo occupies.
pub const LOGO_WIDTH_FRACTION: f64 = 0.15;

/// Base unit for `target`.
pub fn base_unit(target: Canvas) -> f64 {
    f64::from(target.width) / REFERENCE_WIDTH
}

/// Rectangle an image of `image_w x image_h` must be drawn into to cover `target`.
///
/// The image is scaled uniformly by the larger of the two axis ratios and centered, so overflow
/// on the longer axis is cropped equally on both sides.
pub fn cover_fit(target: Canvas, image_w: u32, image_h: u32) -> Rect {
    let tw = f64::from(target.width);
    let th = f64::from(target.height);
    if image_w == 0 || image_h == 0 {
        return Rect::new(0.0, 0.0, tw, th);
    }
    let iw = f64::from(image_w);
    let ih = f64::from(image_h);
    let scale = (tw / iw).max(th / ih);
    let w = iw * scale;
    let h = ih * scale;
    let x = (tw - w) / 2.0;
    let y = (th - h) / 2.0;
    Rect::new(x, y, x + w, y + h)
}

/// Greedy word wrap: each line takes as many words as fit in `max_width`.
///
/// A single word wider than `max_width` gets a line of its own.
pub fn wrap_words(
    text: &str,
    max_width: f32,
    size_px: f32,
    measure: &mut dyn TextMeasure,
) -> ReelResult<Vec<String>> {
    if !max_width.is_finite() || max_width <= 0.0 {
        return Err(ReelError::validation("wrap width must be finite and > 0"));
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure.advance(&candidate, size_px)? <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_owned()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

/// Which edge a speaker is staged on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BubbleSide {
    /// First character.
    Left,
    /// Everyone else.
    Right,
}

/// Scaled bubble dimensions for one render target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleMetrics {
    /// Base unit.
    pub unit: f64,
    /// Outer bubble width.
    pub width: f64,
    /// Inner padding on every side.
    pub padding: f64,
    /// Body font size.
    pub body_size: f64,
    /// Speaker name font size.
    pub name_size: f64,
    /// Advance between body lines.
    pub line_height: f64,
    /// Space reserved for the speaker name.
    pub name_height: f64,
    /// Corner radius.
    pub radius: f64,
    /// Pointer triangle size.
    pub pointer: f64,
    /// Distance from the canvas edges.
    pub margin: f64,
    /// Drop shadow offset.
    pub shadow_offset: f64,
}

impl BubbleMetrics {
    /// Metrics for `target`.
    pub fn for_target(target: Canvas) -> Self {
        let u = base_unit(target);
        let margin = 48.0 * u;
        let body_size = 40.0 * u;
        let name_size = 32.0 * u;
        Self {
            unit: u,
            width: (760.0 * u).min(f64::from(target.width) - 2.0 * margin),
            padding: 36.0 * u,
            body_size,
            name_size,
            line_height: body_size * 1.3,
            name_height: name_size * 1.5,
            radius: 28.0 * u,
            pointer: 36.0 * u,
            margin,
            shadow_offset: 8.0 * u,
        }
    }

    /// Width available to wrapped text.
    pub fn text_width(&self) -> f64 {
        self.width - 2.0 * self.padding
    }

    /// Bubble height for `line_count` wrapped lines.
    pub fn height_for(&self, line_count: usize) -> f64 {
        2.0 * self.padding + self.name_height + line_count as f64 * self.line_height
    }
}

/// Fully resolved speech bubble for one line at one target size.
#[derive(Clone, Debug, PartialEq)]
pub struct BubbleLayout {
    /// Speaker staging side.
    pub side: BubbleSide,
    /// Bubble body.
    pub rect: Rect,
    /// Pointer triangle; the last point is the tip.
    pub pointer: [Point; 3],
    /// Speaker name.
    pub speaker: String,
    /// Wrapped body lines.
    pub lines: Vec<String>,
    /// Metrics used.
    pub metrics: BubbleMetrics,
}

impl BubbleLayout {
    /// Lay out a bubble for `speaker` saying `text` on `target`.
    pub fn compute(
        target: Canvas,
        speaker: &str,
        text: &str,
        side: BubbleSide,
        measure: &mut dyn TextMeasure,
    ) -> ReelResult<Self> {
        let m = BubbleMetrics::for_target(target);
        let lines = wrap_words(text, m.text_width() as f32, m.body_size as f32, measure)?;
        let height = m.height_for(lines.len());

        let x0 = match side {
            BubbleSide::Left => m.margin,
            BubbleSide::Right => f64::from(target.width) - m.margin - m.width,
        };
        let y0 = 2.0 * m.margin;
        let rect = Rect::new(x0, y0, x0 + m.width, y0 + height);

        let p = m.padding;
        let pointer = match side {
            BubbleSide::Left => [
                Point::new(rect.x0 + 2.0 * p, rect.y1),
                Point::new(rect.x0 + 2.0 * p + m.pointer, rect.y1),
                Point::new(rect.x0 + p, rect.y1 + m.pointer),
            ],
            BubbleSide::Right => [
                Point::new(rect.x1 - 2.0 * p - m.pointer, rect.y1),
                Point::new(rect.x1 - 2.0 * p, rect.y1),
                Point::new(rect.x1 - p, rect.y1 + m.pointer),
            ],
        };

        Ok(Self {
            side,
            rect,
            pointer,
            speaker: speaker.to_owned(),
            lines,
            metrics: m,
        })
    }

    /// Top-left origin of the speaker name.
    pub fn name_origin(&self) -> Point {
        Point::new(
            self.rect.x0 + self.metrics.padding,
            self.rect.y0 + self.metrics.padding,
        )
    }

    /// Top-left origin of wrapped body line `i`.
    pub fn line_origin(&self, i: usize) -> Point {
        let m = &self.metrics;
        Point::new(
            self.rect.x0 + m.padding,
            self.rect.y0 + m.padding + m.name_height + i as f64 * m.line_height,
        )
    }
}

/// Scaled caption/logo placement for one render target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayMetrics {
    /// Caption font size.
    pub caption_size: f64,
    /// Caption outline stroke width.
    pub outline_width: f64,
    /// Distance from the canvas edges.
    pub margin: f64,
}

impl OverlayMetrics {
    /// Metrics for `target`.
    pub fn for_target(target: Canvas) -> Self {
        let u = base_unit(target);
        let caption_size = 44.0 * u;
        Self {
            caption_size,
            outline_width: (caption_size * 0.14).max(1.0),
            margin: 40.0 * u,
        }
    }

    /// Top-left origin of a caption `text_width` wide, centered near the bottom edge.
    pub fn caption_origin(&self, target: Canvas, text_width: f64) -> Point {
        Point::new(
            (f64::from(target.width) - text_width) / 2.0,
            f64::from(target.height) - self.margin - self.caption_size * 1.3,
        )
    }

    /// Top-right logo rectangle for a `logo_w x logo_h` image.
    pub fn logo_rect(&self, target: Canvas, logo_w: u32, logo_h: u32) -> Rect {
        let w = f64::from(target.width) * LOGO_WIDTH_FRACTION;
        let h = if logo_w == 0 {
            0.0
        } else {
            w * f64::from(logo_h) / f64::from(logo_w)
        };
        let x1 = f64::from(target.width) - self.margin;
        Rect::new(x1 - w, self.margin, x1, self.margin + h)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/layout.rs"]
mod tests;
