//! Export capture: one render thread per session.
//!
//! The thread renders the timeline at a fixed frame rate into a [`FrameSink`]. Everything the
//! session creates (sink, mix file, export-sized target) is released by a single guard owned by
//! the thread, so teardown runs exactly once whether the export finishes, fails or is stopped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::mix::{MIX_CHANNELS, MIX_SAMPLE_RATE, MixSegment, mix_segments, write_mix_to_f32le_file};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::production::model::Production;
use crate::render::frame::FrameRGBA;
use crate::session::cursor::PlaybackCursor;
use crate::session::stage::StageShared;
use crate::session::timeline::Timeline;

/// How fast export frames are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapturePacing {
    /// One frame per frame interval of wall time, like a screen recording.
    RealTime,
    /// As fast as the compositor and sink allow.
    #[default]
    Offline,
}

/// Parameters of one export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Output frame size.
    pub target: Canvas,
    /// Frame pacing.
    pub pacing: CapturePacing,
}

/// Result of a completed or stopped export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOutcome {
    /// Finished file, when the sink writes one and the export ran to the end.
    pub path: Option<PathBuf>,
    /// Frames pushed into the sink.
    pub frames: u64,
    /// `true` when the export was stopped before the end.
    pub stopped: bool,
}

/// Releases every export resource when dropped.
struct Teardown {
    shared: Arc<StageShared>,
    mix_path: Option<PathBuf>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if let Some(path) = self.mix_path.take()
            && let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove audio mix");
        }
        self.shared.set_cursor(PlaybackCursor::IDLE);
        self.shared.end_export();
        if let Err(e) = self.shared.redraw() {
            tracing::warn!(error = %e, "idle redraw after export failed");
        }
    }
}

/// Live export session.
pub(crate) struct CaptureSession {
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<ReelResult<ExportOutcome>>>,
}

impl CaptureSession {
    /// Switch the stage to `opts.target`, open the sink and start the render thread.
    ///
    /// On error nothing is left behind: the stage is back at its preview size and idle.
    pub(crate) fn start(
        shared: Arc<StageShared>,
        production: Arc<Production>,
        mut sink: Box<dyn FrameSink>,
        opts: ExportOptions,
    ) -> ReelResult<Self> {
        let timeline = Timeline::from_production(&production);
        if timeline.is_empty() {
            return Err(ReelError::playback("cannot export a production without lines"));
        }

        shared.begin_export(opts.target);
        let mut teardown = Teardown {
            shared: Arc::clone(&shared),
            mix_path: None,
        };

        let audio = if production.voiced_lines() > 0 {
            let path = std::env::temp_dir().join(format!(
                "storyreel-mix-{}.f32le",
                uuid::Uuid::new_v4()
            ));
            teardown.mix_path = Some(path.clone());
            let segments: Vec<MixSegment<'_>> = production
                .lines
                .iter()
                .enumerate()
                .filter_map(|(i, line)| {
                    Some(MixSegment {
                        start_sec: timeline.start(i)?.as_secs_f64(),
                        audio: line.audio.as_ref()?,
                    })
                })
                .collect();
            let mix = mix_segments(&segments, timeline.total().as_secs_f64());
            write_mix_to_f32le_file(&mix, &path)?;
            Some(AudioInputConfig {
                path,
                sample_rate: MIX_SAMPLE_RATE,
                channels: MIX_CHANNELS,
            })
        } else {
            None
        };

        sink.begin(SinkConfig {
            width: opts.target.width,
            height: opts.target.height,
            fps: Fps::CAPTURE,
            audio,
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let job = CaptureJob {
            shared,
            production,
            timeline,
            sink,
            opts,
            stop: Arc::clone(&stop),
            frames: Arc::clone(&frames),
        };
        let handle = std::thread::Builder::new()
            .name("storyreel-export".to_owned())
            .spawn(move || {
                let _teardown = teardown;
                job.run()
            })
            .map_err(|e| ReelError::playback(format!("failed to spawn export thread: {e}")))?;

        tracing::info!(
            width = opts.target.width,
            height = opts.target.height,
            pacing = ?opts.pacing,
            "export started"
        );
        Ok(Self {
            stop,
            frames,
            handle: Some(handle),
        })
    }

    /// Flag the render thread polls between frames.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub(crate) fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the render thread to stop and wait for its teardown.
    pub(crate) fn stop(mut self) -> ReelResult<ExportOutcome> {
        self.stop.store(true, Ordering::Release);
        self.join_inner()
    }

    /// Wait for the export to run to its end.
    pub(crate) fn join(mut self) -> ReelResult<ExportOutcome> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> ReelResult<ExportOutcome> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ReelError::playback("export session already joined"))?;
        handle
            .join()
            .map_err(|_| ReelError::playback("export thread panicked"))?
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop.store(true, Ordering::Release);
            if let Err(e) = self.join_inner() {
                tracing::warn!(error = %e, "export dropped with error");
            }
        }
    }
}

struct CaptureJob {
    shared: Arc<StageShared>,
    production: Arc<Production>,
    timeline: Timeline,
    sink: Box<dyn FrameSink>,
    opts: ExportOptions,
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
}

impl CaptureJob {
    fn run(mut self) -> ReelResult<ExportOutcome> {
        match self.render_all() {
            Ok(true) => {
                self.sink.end()?;
                let outcome = ExportOutcome {
                    path: self.sink.output_path(),
                    frames: self.frames.load(Ordering::Acquire),
                    stopped: false,
                };
                tracing::info!(frames = outcome.frames, path = ?outcome.path, "export finished");
                Ok(outcome)
            }
            Ok(false) => {
                self.sink.abort();
                let frames = self.frames.load(Ordering::Acquire);
                tracing::info!(frames, "export stopped");
                Ok(ExportOutcome {
                    path: None,
                    frames,
                    stopped: true,
                })
            }
            Err(e) => {
                self.sink.abort();
                tracing::error!(error = %e, "export failed");
                Err(e)
            }
        }
    }

    /// Returns `Ok(false)` when stopped early.
    fn render_all(&mut self) -> ReelResult<bool> {
        let fps = Fps::CAPTURE;
        let total = self.timeline.frame_count(fps);
        let started = Instant::now();
        let mut last: Option<((PlaybackCursor, u64), FrameRGBA)> = None;

        for i in 0..total {
            if self.stop.load(Ordering::Acquire) {
                return Ok(false);
            }
            let t = Duration::from_secs_f64(fps.frames_to_secs(i));
            let cursor = self.timeline.line_at(t);
            self.shared.set_cursor(cursor);

            let key = (cursor, self.shared.overlay_revision());
            if last.as_ref().is_none_or(|(k, _)| *k != key) {
                let draw_started = Instant::now();
                let f = self
                    .shared
                    .draw(cursor, self.opts.target, Some(&self.production))?;
                tracing::debug!(
                    frame = i,
                    %cursor,
                    elapsed_ms = draw_started.elapsed().as_secs_f64() * 1000.0,
                    "export frame drawn"
                );
                last = Some((key, f));
            }
            let Some((_, frame)) = &last else {
                return Err(ReelError::render("export frame missing"));
            };
            self.sink.push_frame(FrameIndex(i), frame)?;
            self.frames.store(i + 1, Ordering::Release);

            if self.opts.pacing == CapturePacing::RealTime {
                let due = started + Duration::from_secs_f64(fps.frames_to_secs(i + 1));
                if let Some(wait) = due.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
            }
        }
        Ok(true)
    }
}
