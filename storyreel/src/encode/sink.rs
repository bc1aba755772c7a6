use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::ReelResult;
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] at the start of an export.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Optional external raw PCM audio file input.
    pub audio: Option<AudioInputConfig>,
}

/// Raw PCM audio input configuration for sinks that support audio encoding.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// `push_frame` is called in strictly increasing `FrameIndex` order. Exactly one of `end` or
/// `abort` closes a started sink.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()>;
    /// Finalize the output after the last frame.
    fn end(&mut self) -> ReelResult<()>;
    /// Stop without producing output, discarding anything partially written.
    fn abort(&mut self);
    /// Where finished output lands, when the sink writes a file.
    fn output_path(&self) -> Option<PathBuf> {
        None
    }
}

/// What an [`InMemorySink`] observed.
#[derive(Debug, Default, Clone)]
pub struct CapturedFrames {
    /// Configuration passed to `begin`.
    pub config: Option<SinkConfig>,
    /// Indices of every pushed frame, in order.
    pub indices: Vec<FrameIndex>,
    /// Number of times the pushed frame differed from the one before it.
    pub distinct: usize,
    /// Most recently pushed frame.
    pub last: Option<FrameRGBA>,
    /// `end` was called.
    pub ended: bool,
    /// `abort` was called.
    pub aborted: bool,
}

/// In-memory sink for tests and debugging.
///
/// Clones share the same capture, so a handle kept by the caller observes frames pushed by the
/// export thread.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    captured: Arc<parking_lot::Mutex<CapturedFrames>>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far.
    pub fn captured(&self) -> CapturedFrames {
        self.captured.lock().clone()
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        *self.captured.lock() = CapturedFrames {
            config: Some(cfg),
            ..CapturedFrames::default()
        };
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let mut c = self.captured.lock();
        c.indices.push(idx);
        if c.last.as_ref() != Some(frame) {
            c.distinct += 1;
            c.last = Some(frame.clone());
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        self.captured.lock().ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.captured.lock().aborted = true;
    }
}
