use crate::foundation::error::{ReelError, ReelResult};

pub use kurbo::{Point, Rect};

/// Absolute 0-based frame index in export timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Fixed capture rate used by export.
    pub const CAPTURE: Fps = Fps { num: 30, den: 1 };

    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ReelResult<Self> {
        if den == 0 {
            return Err(ReelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Number of frames needed to cover `secs` (ceil semantics).
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64()).ceil().max(0.0) as u64
    }
}

/// Render target dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas, rejecting zero or rasterizer-unsupported sizes.
    pub fn new(width: u32, height: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("canvas width/height must be non-zero"));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(ReelError::validation(format!(
                "canvas {width}x{height} exceeds the rasterizer limit of {}",
                u16::MAX
            )));
        }
        Ok(Self { width, height })
    }

    /// Width divided by height.
    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

/// Canvas orientation requested for a production.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AspectRatio {
    /// 16:9.
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16.
    #[serde(rename = "9:16")]
    Portrait,
    /// 1:1.
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// Ratio string as understood by image backends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }

    /// Parse `16:9`, `9:16` or `1:1`.
    pub fn parse(s: &str) -> ReelResult<Self> {
        match s.trim() {
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            "1:1" => Ok(Self::Square),
            other => Err(ReelError::validation(format!(
                "unsupported aspect ratio '{other}' (expected 16:9, 9:16 or 1:1)"
            ))),
        }
    }

    /// Orientation word used when describing the scene to an image model.
    pub fn orientation_hint(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }

    /// Canvas for a given short-side length.
    pub fn canvas_for_short_side(self, short: u32) -> Canvas {
        let long = short * 16 / 9;
        match self {
            Self::Landscape => Canvas {
                width: long,
                height: short,
            },
            Self::Portrait => Canvas {
                width: short,
                height: long,
            },
            Self::Square => Canvas {
                width: short,
                height: short,
            },
        }
    }

    /// Small canvas used while previewing.
    pub fn preview_canvas(self) -> Canvas {
        match self {
            Self::Square => self.canvas_for_short_side(480),
            _ => self.canvas_for_short_side(360),
        }
    }
}

/// Export resolution presets, named by their short side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExportResolution {
    /// 1080p.
    #[default]
    #[serde(rename = "1080")]
    Hd1080,
    /// 2160p ("4K").
    #[serde(rename = "2160")]
    Uhd2160,
}

impl ExportResolution {
    /// Short side in pixels.
    pub fn short_side(self) -> u32 {
        match self {
            Self::Hd1080 => 1080,
            Self::Uhd2160 => 2160,
        }
    }

    /// Export canvas for the given aspect ratio.
    pub fn canvas(self, aspect: AspectRatio) -> Canvas {
        aspect.canvas_for_short_side(self.short_side())
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color with explicit alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn parse_hex(s: &str) -> ReelResult<Self> {
        let hex = s.trim().trim_start_matches('#');
        let bad = || ReelError::validation(format!("invalid hex color '{s}'"));
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        match hex.len() {
            3 => {
                let nib = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| bad())
                };
                Ok(Self::rgb(nib(0)?, nib(1)?, nib(2)?))
            }
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(bad()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
