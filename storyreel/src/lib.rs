//! storyreel produces short dialogue scenes: a generated cast and script, one background
//! image, speech for every line, and speech bubbles composited over the scene.
//!
//! The crate is organized around four steps:
//!
//! - Generate a [`Production`] with an [`Orchestrator`] over a [`GenerationBackend`]
//! - Draw frames of it with a [`Compositor`]
//! - Preview it on a [`Stage`] through a [`PreviewOutput`]
//! - Export it from the same [`Stage`] into a [`FrameSink`] (an `ffmpeg` process by default)
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;

pub(crate) mod audio;
pub(crate) mod backend;
pub(crate) mod config;
/// Export encoding sinks.
pub mod encode;
pub(crate) mod production;
pub(crate) mod render;
pub(crate) mod session;

pub use crate::foundation::core::{
    AspectRatio, Canvas, ExportResolution, Fps, FrameIndex, Point, Rect, Rgba8,
};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assets::decode::{DecodedImage, decode_image, decode_logo};
pub use crate::audio::mix::{MIX_CHANNELS, MIX_SAMPLE_RATE};
pub use crate::audio::wav::{
    SPEECH_SAMPLE_RATE, SpeechAudio, WAV_HEADER_LEN, decode_base64_to_bytes,
    pcm_s16le_to_samples, pcm_to_wav,
};
pub use crate::backend::gemini::GeminiBackend;
pub use crate::backend::retry::{CredentialPrompt, Retrier, RetryClass, RetryPolicy, with_retry};
pub use crate::backend::{
    BackendError, BackendErrorKind, BackendResult, GenerationBackend, ScriptLine,
};
pub use crate::config::{BackendConfig, RenderConfig, StudioConfig};
pub use crate::encode::ffmpeg::{
    ContainerFormat, FfmpegSink, FfmpegSinkOpts, export_file_name, is_ffmpeg_on_path,
    probe_container, select_container,
};
pub use crate::encode::sink::{
    AudioInputConfig, CapturedFrames, FrameSink, InMemorySink, SinkConfig,
};
pub use crate::production::model::{
    CastRequest, Character, DialogueLine, Gender, OverlayConfig, Production, ProductionRequest,
    SceneAsset, VoiceId,
};
pub use crate::production::orchestrator::{Orchestrator, ProductionStage, scene_prompt};
pub use crate::production::store::{
    DirProjectStore, MemoryProjectStore, Project, ProjectId, ProjectStore, ProjectSummary,
};
pub use crate::render::compositor::{AssetEvent, Compositor, send_decoded_assets};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::layout::{
    BubbleLayout, BubbleMetrics, BubbleSide, LOGO_WIDTH_FRACTION, OverlayMetrics, base_unit,
    cover_fit, wrap_words,
};
pub use crate::render::text::{ApproxMeasure, TextBrushRgba8, TextLayoutEngine, TextMeasure};
pub use crate::session::capture::{CapturePacing, ExportOptions, ExportOutcome};
pub use crate::session::cursor::PlaybackCursor;
pub use crate::session::preview::{NullPreview, PreviewOutput};
pub use crate::session::stage::Stage;
pub use crate::session::timeline::{SILENT_HOLD, SPEECH_TAIL, Timeline, hold_for};
