use crate::audio::wav::SpeechAudio;
use crate::render::frame::FrameRGBA;
use crate::session::cursor::PlaybackCursor;

/// Where preview frames and line audio go.
///
/// Calls arrive from the preview task and, for idle redraws, from whichever thread triggered
/// them, so implementations must be thread-safe and quick.
pub trait PreviewOutput: Send + Sync {
    /// Show a freshly drawn frame.
    fn present(&self, cursor: PlaybackCursor, frame: &FrameRGBA);

    /// Start playing a line's speech.
    fn play(&self, audio: &SpeechAudio);

    /// Silence any speech still playing.
    fn stop_audio(&self) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPreview;

impl PreviewOutput for NullPreview {
    fn present(&self, _cursor: PlaybackCursor, _frame: &FrameRGBA) {}

    fn play(&self, _audio: &SpeechAudio) {}
}
