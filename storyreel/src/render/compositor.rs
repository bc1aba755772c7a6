//! CPU compositor for dialogue frames.
//!
//! A frame is built in a fixed order: background (cover-fitted scene or a flat fill while the
//! scene is still decoding), the speech bubble for the current line, the caption and the logo.
//! Decoded images reach the compositor through [`AssetEvent`]s; the channel is drained at the
//! start of every draw, so decoding never blocks drawing.

use std::sync::{Arc, mpsc};

use kurbo::Shape;

use crate::assets::decode::{DecodedImage, decode_image, decode_logo};
use crate::foundation::core::{Canvas, Point, Rect, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::production::model::{OverlayConfig, Production};
use crate::render::frame::FrameRGBA;
use crate::render::layout::{BubbleLayout, BubbleSide, OverlayMetrics};
use crate::render::text::{ApproxMeasure, TextBrushRgba8, TextLayoutEngine};
use crate::session::cursor::PlaybackCursor;

const IDLE_BACKGROUND: Rgba8 = Rgba8::rgb(0x0f, 0x17, 0x2a);
const LOADING_BACKGROUND: Rgba8 = Rgba8::rgb(0x1e, 0x29, 0x3b);
const BUBBLE_FILL: Rgba8 = Rgba8::rgb(0xff, 0xff, 0xff);
const BUBBLE_SHADOW: Rgba8 = Rgba8::rgba(0, 0, 0, 90);
const LEFT_ACCENT: Rgba8 = Rgba8::rgb(0x25, 0x63, 0xeb);
const RIGHT_ACCENT: Rgba8 = Rgba8::rgb(0xdb, 0x27, 0x77);
const BODY_TEXT: Rgba8 = Rgba8::rgb(0x11, 0x18, 0x27);
const CAPTION_OUTLINE: Rgba8 = Rgba8::rgb(0, 0, 0);

/// Decoded image delivered to the compositor.
#[derive(Debug)]
pub enum AssetEvent {
    /// The scene encoded as `source` finished decoding.
    SceneReady {
        /// Encoded bytes the image was decoded from.
        source: Arc<Vec<u8>>,
        /// Decoded pixels.
        image: DecodedImage,
    },
    /// The logo encoded as `source` finished decoding.
    LogoReady {
        /// Encoded bytes the image was decoded from.
        source: Arc<Vec<u8>>,
        /// Decoded pixels.
        image: DecodedImage,
    },
    /// Drop every decoded image.
    Cleared,
}

/// Decode the scene of `production` and the logo of `overlay`, sending one event per success.
///
/// Decode failures are logged; the compositor keeps drawing the flat fill (or no logo).
pub fn send_decoded_assets(
    production: Option<&Production>,
    overlay: Option<&OverlayConfig>,
    tx: &mpsc::Sender<AssetEvent>,
) {
    if let Some(p) = production {
        match decode_image(&p.scene.image) {
            Ok(image) => {
                let _ = tx.send(AssetEvent::SceneReady {
                    source: Arc::clone(&p.scene.image),
                    image,
                });
            }
            Err(e) => tracing::warn!(error = %e, "scene image failed to decode"),
        }
    }
    if let Some(logo) = overlay.and_then(|o| o.logo.as_ref()) {
        match decode_logo(logo) {
            Ok(image) => {
                let _ = tx.send(AssetEvent::LogoReady {
                    source: Arc::clone(logo),
                    image,
                });
            }
            Err(e) => tracing::warn!(error = %e, "logo failed to decode"),
        }
    }
}

#[derive(Clone)]
struct LoadedImage {
    source: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    paint: vello_cpu::Image,
}

impl LoadedImage {
    fn from_decoded(source: Arc<Vec<u8>>, image: &DecodedImage) -> ReelResult<Self> {
        let pixmap = pixmap_from_premul_bytes(&image.rgba8_premul, image.width, image.height)?;
        Ok(Self {
            source,
            width: image.width,
            height: image.height,
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
        })
    }
}

struct TextStack {
    engine: TextLayoutEngine,
    font: vello_cpu::peniko::FontData,
}

struct Surface {
    canvas: Canvas,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
}

#[derive(Clone, PartialEq, Eq)]
struct BubbleKey {
    target: Canvas,
    side: BubbleSide,
    speaker: String,
    text: String,
}

type ShapedLine = (Point, parley::Layout<TextBrushRgba8>);

/// Draws dialogue frames for any render target.
pub struct Compositor {
    text: Option<TextStack>,
    surface: Option<Surface>,
    scene: Option<LoadedImage>,
    logo: Option<LoadedImage>,
    bubble_cache: Option<(BubbleKey, BubbleLayout)>,
    assets_tx: mpsc::Sender<AssetEvent>,
    assets_rx: mpsc::Receiver<AssetEvent>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("has_font", &self.text.is_some())
            .field("has_scene", &self.scene.is_some())
            .field("has_logo", &self.logo.is_some())
            .finish_non_exhaustive()
    }
}

impl Compositor {
    /// Create a compositor. Without font bytes, text is measured approximately and not drawn.
    pub fn new(font_bytes: Option<Arc<Vec<u8>>>) -> Self {
        let text = font_bytes.map(|bytes| TextStack {
            font: vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
                0,
            ),
            engine: TextLayoutEngine::new(bytes),
        });
        let (assets_tx, assets_rx) = mpsc::channel();
        Self {
            text,
            surface: None,
            scene: None,
            logo: None,
            bubble_cache: None,
            assets_tx,
            assets_rx,
        }
    }

    /// Sender for decoded assets; may be moved to a decoding thread.
    pub fn asset_sender(&self) -> mpsc::Sender<AssetEvent> {
        self.assets_tx.clone()
    }

    /// Whether a decoded scene for `production` is available.
    pub fn has_scene_for(&mut self, production: &Production) -> bool {
        self.drain_assets();
        self.scene
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(&s.source, &production.scene.image))
    }

    /// Whether a decoded logo for `overlay` is available.
    pub fn has_logo_for(&mut self, overlay: &OverlayConfig) -> bool {
        self.drain_assets();
        matches!((&self.logo, &overlay.logo), (Some(l), Some(src)) if Arc::ptr_eq(&l.source, src))
    }

    fn drain_assets(&mut self) {
        while let Ok(ev) = self.assets_rx.try_recv() {
            match ev {
                AssetEvent::SceneReady { source, image } => {
                    match LoadedImage::from_decoded(source, &image) {
                        Ok(img) => self.scene = Some(img),
                        Err(e) => tracing::warn!(error = %e, "scene image rejected"),
                    }
                }
                AssetEvent::LogoReady { source, image } => {
                    match LoadedImage::from_decoded(source, &image) {
                        Ok(img) => self.logo = Some(img),
                        Err(e) => tracing::warn!(error = %e, "logo image rejected"),
                    }
                }
                AssetEvent::Cleared => {
                    self.scene = None;
                    self.logo = None;
                    self.bubble_cache = None;
                }
            }
        }
    }

    fn bubble_for(
        &mut self,
        target: Canvas,
        speaker: &str,
        text: &str,
        side: BubbleSide,
    ) -> ReelResult<BubbleLayout> {
        let key = BubbleKey {
            target,
            side,
            speaker: speaker.to_owned(),
            text: text.to_owned(),
        };
        if let Some((k, layout)) = &self.bubble_cache
            && *k == key
        {
            return Ok(layout.clone());
        }
        let layout = match &mut self.text {
            Some(t) => BubbleLayout::compute(target, speaker, text, side, &mut t.engine)?,
            None => BubbleLayout::compute(target, speaker, text, side, &mut ApproxMeasure::default())?,
        };
        self.bubble_cache = Some((key, layout.clone()));
        Ok(layout)
    }

    /// Render one frame for `cursor` at `target` size.
    ///
    /// An idle cursor draws background and overlay only. A line cursor requires a production.
    pub fn draw_frame(
        &mut self,
        cursor: PlaybackCursor,
        target: Canvas,
        production: Option<&Production>,
        overlay: &OverlayConfig,
    ) -> ReelResult<FrameRGBA> {
        self.drain_assets();

        let bubble = match (cursor.index(), production) {
            (None, _) => None,
            (Some(i), Some(p)) => {
                let line = p.lines.get(i).ok_or_else(|| {
                    ReelError::playback(format!("{cursor} is past the end of the script"))
                })?;
                let side = if p.speaker_on_left(&line.speaker) {
                    BubbleSide::Left
                } else {
                    BubbleSide::Right
                };
                Some(self.bubble_for(target, &line.speaker, &line.text, side)?)
            }
            (Some(_), None) => {
                return Err(ReelError::playback("cursor on a line with no production loaded"));
            }
        };

        let overlay_metrics = OverlayMetrics::for_target(target);
        let mut bubble_text: Vec<ShapedLine> = Vec::new();
        let mut caption: Option<ShapedLine> = None;
        if let Some(t) = &mut self.text {
            if let Some(b) = &bubble {
                let m = b.metrics;
                let accent = match b.side {
                    BubbleSide::Left => LEFT_ACCENT,
                    BubbleSide::Right => RIGHT_ACCENT,
                };
                let name = t
                    .engine
                    .layout_line(&b.speaker, m.name_size as f32, accent.into())?;
                bubble_text.push((b.name_origin(), name));
                for (i, line) in b.lines.iter().enumerate() {
                    let layout = t
                        .engine
                        .layout_line(line, m.body_size as f32, BODY_TEXT.into())?;
                    bubble_text.push((b.line_origin(i), layout));
                }
            }
            let text = overlay.text.trim();
            if !text.is_empty() {
                let layout = t.engine.layout_line(
                    text,
                    overlay_metrics.caption_size as f32,
                    overlay.text_color.into(),
                )?;
                let origin = overlay_metrics.caption_origin(target, f64::from(layout.width()));
                caption = Some((origin, layout));
            }
        }

        let scene = match production {
            Some(p) => self
                .scene
                .as_ref()
                .filter(|s| Arc::ptr_eq(&s.source, &p.scene.image)),
            None => None,
        };
        let logo = match (&self.logo, &overlay.logo) {
            (Some(l), Some(src)) if Arc::ptr_eq(&l.source, src) => Some(l),
            _ => None,
        };

        if self.surface.as_ref().is_none_or(|s| s.canvas != target) {
            self.surface = Some(new_surface(target)?);
        }
        let Some(surface) = self.surface.as_mut() else {
            return Err(ReelError::render("render surface missing"));
        };
        let ctx = &mut surface.ctx;
        ctx.reset();
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        let full = vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(target.width),
            f64::from(target.height),
        );
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(color(if production.is_some() {
            LOADING_BACKGROUND
        } else {
            IDLE_BACKGROUND
        }));
        ctx.fill_rect(&full);

        if let Some(s) = scene {
            let r = crate::render::layout::cover_fit(target, s.width, s.height);
            draw_image(ctx, s, r);
        }

        if let Some(b) = &bubble {
            draw_bubble(ctx, b);
        }

        if let Some(t) = &self.text {
            for (origin, layout) in &bubble_text {
                draw_text(ctx, &t.font, layout, *origin, None);
            }
            if let Some((origin, layout)) = &caption {
                let outline = (overlay_metrics.outline_width, CAPTION_OUTLINE);
                draw_text(ctx, &t.font, layout, *origin, Some(outline));
            }
        }

        if let Some(l) = logo {
            let r = overlay_metrics.logo_rect(target, l.width, l.height);
            draw_image(ctx, l, r);
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut surface.pixmap);

        Ok(FrameRGBA {
            width: target.width,
            height: target.height,
            data: surface.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn new_surface(target: Canvas) -> ReelResult<Surface> {
    let w: u16 = target
        .width
        .try_into()
        .map_err(|_| ReelError::render("target width exceeds u16"))?;
    let h: u16 = target
        .height
        .try_into()
        .map_err(|_| ReelError::render("target height exceeds u16"))?;
    Ok(Surface {
        canvas: target,
        ctx: vello_cpu::RenderContext::new(w, h),
        pixmap: vello_cpu::Pixmap::new(w, h),
    })
}

fn color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn draw_image(ctx: &mut vello_cpu::RenderContext, img: &LoadedImage, dst: Rect) {
    let sx = dst.width() / f64::from(img.width.max(1));
    let sy = dst.height() / f64::from(img.height.max(1));
    ctx.set_transform(
        vello_cpu::kurbo::Affine::translate((dst.x0, dst.y0))
            * vello_cpu::kurbo::Affine::scale_non_uniform(sx, sy),
    );
    ctx.set_paint(img.paint.clone());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(img.width),
        f64::from(img.height),
    ));
}

fn draw_bubble(ctx: &mut vello_cpu::RenderContext, b: &BubbleLayout) {
    let m = b.metrics;
    let body = kurbo::RoundedRect::from_rect(b.rect, m.radius).to_path(0.1);
    let mut pointer = kurbo::BezPath::new();
    pointer.move_to(b.pointer[0]);
    pointer.line_to(b.pointer[2]);
    pointer.line_to(b.pointer[1]);
    pointer.close_path();

    let body = bezpath_to_cpu(&body);
    let pointer = bezpath_to_cpu(&pointer);

    ctx.set_transform(vello_cpu::kurbo::Affine::translate((
        m.shadow_offset,
        m.shadow_offset,
    )));
    ctx.set_paint(color(BUBBLE_SHADOW));
    ctx.fill_path(&body);
    ctx.fill_path(&pointer);

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(color(BUBBLE_FILL));
    ctx.fill_path(&body);
    ctx.fill_path(&pointer);
}

fn draw_text(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrushRgba8>,
    origin: Point,
    outline: Option<(f64, Rgba8)>,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = || {
                run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                })
            };
            let size = run.run().font_size();
            if let Some((width, c)) = outline {
                ctx.set_paint(color(c));
                ctx.set_stroke(
                    vello_cpu::kurbo::Stroke::new(2.0 * width)
                        .with_join(vello_cpu::kurbo::Join::Round),
                );
                ctx.glyph_run(font).font_size(size).stroke_glyphs(glyphs());
            }
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            ctx.glyph_run(font).font_size(size).fill_glyphs(glyphs());
        }
    }
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let pt = |p: kurbo::Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReelError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReelError::render("image height exceeds u16"))?;
    if bytes.len() != (width as usize) * (height as usize) * 4 {
        return Err(ReelError::render("image byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
