//! The stage: one compositor, one current production, one cursor.
//!
//! Preview playback runs as a tokio task; export runs on its own thread (see
//! [`crate::session::capture`]). Only one of them is active at a time. Whichever side advances
//! the cursor is the only writer of the cursor channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, export_file_name, probe_container};
use crate::encode::sink::FrameSink;
use crate::foundation::core::{AspectRatio, Canvas, ExportResolution};
use crate::foundation::error::{ReelError, ReelResult};
use crate::production::model::{OverlayConfig, Production};
use crate::render::compositor::{AssetEvent, Compositor, send_decoded_assets};
use crate::render::frame::FrameRGBA;
use crate::session::capture::{CapturePacing, CaptureSession, ExportOptions, ExportOutcome};
use crate::session::cursor::PlaybackCursor;
use crate::session::preview::PreviewOutput;
use crate::session::timeline::Timeline;

struct StageState {
    production: Option<Arc<Production>>,
    overlay: OverlayConfig,
    preview_target: Canvas,
    target: Canvas,
    /// Set together with `target`; while false, `target == preview_target`.
    exporting: bool,
}

/// State shared between the stage, its preview task and its export thread.
pub(crate) struct StageShared {
    compositor: Mutex<Compositor>,
    state: Mutex<StageState>,
    cursor: watch::Sender<PlaybackCursor>,
    output: Arc<dyn PreviewOutput>,
    overlay_rev: AtomicU64,
    /// Bumped to invalidate a running preview; held while the preview presents a line.
    preview_epoch: Mutex<u64>,
}

impl StageShared {
    pub(crate) fn set_cursor(&self, cursor: PlaybackCursor) {
        self.cursor.send_if_modified(|c| {
            if *c == cursor {
                return false;
            }
            *c = cursor;
            true
        });
    }

    pub(crate) fn overlay_revision(&self) -> u64 {
        self.overlay_rev.load(Ordering::Acquire)
    }

    pub(crate) fn begin_export(&self, target: Canvas) {
        let mut s = self.state.lock();
        s.exporting = true;
        s.target = target;
    }

    pub(crate) fn end_export(&self) {
        let mut s = self.state.lock();
        s.target = s.preview_target;
        s.exporting = false;
    }

    fn is_exporting(&self) -> bool {
        self.state.lock().exporting
    }

    /// Draw `cursor` at `target` with the current overlay.
    pub(crate) fn draw(
        &self,
        cursor: PlaybackCursor,
        target: Canvas,
        production: Option<&Production>,
    ) -> ReelResult<FrameRGBA> {
        let overlay = self.state.lock().overlay.clone();
        self.compositor
            .lock()
            .draw_frame(cursor, target, production, &overlay)
    }

    fn draw_and_present(&self, cursor: PlaybackCursor) -> ReelResult<()> {
        let (production, target) = {
            let s = self.state.lock();
            (s.production.clone(), s.target)
        };
        self.present_at(cursor, target, production.as_deref())
    }

    fn present_at(
        &self,
        cursor: PlaybackCursor,
        target: Canvas,
        production: Option<&Production>,
    ) -> ReelResult<()> {
        let frame = self.draw(cursor, target, production)?;
        self.output.present(cursor, &frame);
        Ok(())
    }

    /// Redraw the current cursor at the current target and present it.
    pub(crate) fn redraw(&self) -> ReelResult<()> {
        let cursor = *self.cursor.borrow();
        self.draw_and_present(cursor)
    }

    /// Flag and target come from one lock so an export starting meanwhile is never drawn at.
    fn redraw_unless_exporting(&self) {
        let cursor = *self.cursor.borrow();
        let (production, target) = {
            let s = self.state.lock();
            if s.exporting {
                return;
            }
            (s.production.clone(), s.target)
        };
        if let Err(e) = self.present_at(cursor, target, production.as_deref()) {
            tracing::warn!(error = %e, "redraw failed");
        }
    }
}

/// Drives preview playback and export of the loaded production.
pub struct Stage {
    shared: Arc<StageShared>,
    preview: Option<tokio::task::JoinHandle<()>>,
    capture: Option<CaptureSession>,
    decoders: Vec<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("cursor", &self.cursor())
            .field("target", &self.target())
            .field("playing", &self.is_playing())
            .field("exporting", &self.is_exporting())
            .finish_non_exhaustive()
    }
}

impl Stage {
    /// Create an idle stage sized for `aspect_ratio` previews.
    pub fn new(
        compositor: Compositor,
        output: Arc<dyn PreviewOutput>,
        aspect_ratio: AspectRatio,
    ) -> Self {
        let preview_target = aspect_ratio.preview_canvas();
        let (cursor, _) = watch::channel(PlaybackCursor::IDLE);
        Self {
            shared: Arc::new(StageShared {
                compositor: Mutex::new(compositor),
                state: Mutex::new(StageState {
                    production: None,
                    overlay: OverlayConfig::default(),
                    preview_target,
                    target: preview_target,
                    exporting: false,
                }),
                cursor,
                output,
                overlay_rev: AtomicU64::new(0),
                preview_epoch: Mutex::new(0),
            }),
            preview: None,
            capture: None,
            decoders: Vec::new(),
        }
    }

    /// Current cursor.
    pub fn cursor(&self) -> PlaybackCursor {
        *self.shared.cursor.borrow()
    }

    /// Receiver notified on every cursor change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackCursor> {
        self.shared.cursor.subscribe()
    }

    /// Size frames are currently drawn at.
    pub fn target(&self) -> Canvas {
        self.shared.state.lock().target
    }

    /// Size used outside of export.
    pub fn preview_target(&self) -> Canvas {
        self.shared.state.lock().preview_target
    }

    /// Loaded production, if any.
    pub fn production(&self) -> Option<Arc<Production>> {
        self.shared.state.lock().production.clone()
    }

    /// Current overlay.
    pub fn overlay(&self) -> OverlayConfig {
        self.shared.state.lock().overlay.clone()
    }

    /// `true` while preview playback is running.
    pub fn is_playing(&self) -> bool {
        self.preview.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// `true` while an export session exists.
    pub fn is_exporting(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureSession::is_running)
            || self.shared.is_exporting()
    }

    /// Frames pushed by the running export, if any.
    pub fn frames_captured(&self) -> Option<u64> {
        self.capture.as_ref().map(CaptureSession::frames_rendered)
    }

    /// Number of live background activities: preview task, export thread, asset decoders.
    pub fn active_tasks(&self) -> usize {
        usize::from(self.is_playing())
            + usize::from(self.capture.as_ref().is_some_and(CaptureSession::is_running))
            + self.decoders.iter().filter(|h| !h.is_finished()).count()
    }

    /// Replace the production, reset to idle and start decoding its scene.
    pub fn load_production(&mut self, production: Production) -> ReelResult<()> {
        if self.is_exporting() {
            return Err(ReelError::playback("cannot load a production while exporting"));
        }
        self.stop_preview();
        let production = Arc::new(production);
        let overlay = {
            let mut s = self.shared.state.lock();
            s.production = Some(Arc::clone(&production));
            s.preview_target = production.aspect_ratio.preview_canvas();
            s.target = s.preview_target;
            s.overlay.clone()
        };
        self.shared.set_cursor(PlaybackCursor::IDLE);

        let tx = self.shared.compositor.lock().asset_sender();
        let _ = tx.send(AssetEvent::Cleared);
        self.spawn_decoder(move |tx| send_decoded_assets(Some(&production), Some(&overlay), tx), tx)?;
        self.shared.redraw_unless_exporting();
        Ok(())
    }

    fn spawn_decoder(
        &mut self,
        decode: impl FnOnce(&std::sync::mpsc::Sender<AssetEvent>) + Send + 'static,
        tx: std::sync::mpsc::Sender<AssetEvent>,
    ) -> ReelResult<()> {
        self.decoders.retain(|h| !h.is_finished());
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("storyreel-decode".to_owned())
            .spawn(move || {
                decode(&tx);
                shared.redraw_unless_exporting();
            })
            .map_err(|e| ReelError::playback(format!("failed to spawn decoder: {e}")))?;
        self.decoders.push(handle);
        Ok(())
    }

    /// Block until every pending asset decode has been delivered.
    pub fn wait_for_assets(&mut self) {
        for h in self.decoders.drain(..) {
            if h.join().is_err() {
                tracing::warn!("asset decoder panicked");
            }
        }
    }

    /// Replace the caption/logo overlay and redraw.
    pub fn set_overlay(&mut self, overlay: OverlayConfig) -> ReelResult<()> {
        let logo_changed = {
            let mut s = self.shared.state.lock();
            let changed = match (&s.overlay.logo, &overlay.logo) {
                (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
                (None, None) => false,
                _ => true,
            };
            s.overlay = overlay.clone();
            changed
        };
        self.shared.overlay_rev.fetch_add(1, Ordering::AcqRel);
        if logo_changed && overlay.logo.is_some() {
            let tx = self.shared.compositor.lock().asset_sender();
            self.spawn_decoder(move |tx| send_decoded_assets(None, Some(&overlay), tx), tx)?;
        }
        self.shared.redraw_unless_exporting();
        Ok(())
    }

    /// Switch previews to `aspect_ratio` and redraw.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.set_preview_target(aspect_ratio.preview_canvas());
    }

    /// Change the preview size and redraw.
    pub fn set_preview_target(&mut self, target: Canvas) {
        {
            let mut s = self.shared.state.lock();
            s.preview_target = target;
            if !s.exporting {
                s.target = target;
            }
        }
        self.shared.redraw_unless_exporting();
    }

    /// Redraw the current cursor.
    pub fn redraw(&self) -> ReelResult<()> {
        self.shared.redraw()
    }

    /// Start preview playback from the first line. Must be called within a tokio runtime.
    pub fn play(&mut self) -> ReelResult<()> {
        if self.is_exporting() {
            return Err(ReelError::playback("cannot preview while exporting"));
        }
        let production = self
            .production()
            .ok_or_else(|| ReelError::playback("no production loaded"))?;
        if production.lines.is_empty() {
            return Err(ReelError::playback("production has no lines"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ReelError::playback("preview playback requires a tokio runtime"))?;

        self.stop_preview();
        let epoch = *self.shared.preview_epoch.lock();
        let shared = Arc::clone(&self.shared);
        tracing::info!(lines = production.lines.len(), "preview started");
        self.preview = Some(runtime.spawn(run_preview(shared, production, epoch)));
        Ok(())
    }

    /// Wait for preview playback to reach its end.
    pub async fn join_preview(&mut self) {
        if let Some(h) = self.preview.take()
            && let Err(e) = h.await
            && !e.is_cancelled()
        {
            tracing::warn!(error = %e, "preview task failed");
        }
    }

    fn stop_preview(&mut self) -> bool {
        let Some(handle) = self.preview.take() else {
            return false;
        };
        *self.shared.preview_epoch.lock() += 1;
        handle.abort();
        self.shared.output.stop_audio();
        true
    }

    /// Stop whatever is running, reset the cursor and redraw the idle frame.
    ///
    /// Returns once the preview can no longer present and the export thread has torn down.
    pub fn stop(&mut self) {
        let stopped_preview = self.stop_preview();
        if let Some(capture) = self.capture.take() {
            match capture.stop() {
                Ok(outcome) => tracing::debug!(frames = outcome.frames, "export stopped by caller"),
                Err(e) => tracing::warn!(error = %e, "export ended with error while stopping"),
            }
        } else if stopped_preview {
            tracing::info!("preview stopped");
        }
        self.shared.set_cursor(PlaybackCursor::IDLE);
        self.shared.redraw_unless_exporting();
    }

    /// Export into `out_dir` as `<stem>_<w>x<h>_<timestamp>.<ext>` through the system `ffmpeg`.
    pub fn start_export(
        &mut self,
        out_dir: &Path,
        stem: &str,
        resolution: ExportResolution,
        pacing: CapturePacing,
    ) -> ReelResult<PathBuf> {
        let production = self
            .production()
            .ok_or_else(|| ReelError::playback("no production loaded"))?;
        let target = resolution.canvas(production.aspect_ratio);
        let container = probe_container()?;
        let name = export_file_name(stem, target, container, chrono::Local::now().naive_local());
        let path = out_dir.join(name);
        let sink = FfmpegSink::new(FfmpegSinkOpts::new(&path, container));
        self.start_export_with_sink(Box::new(sink), ExportOptions { target, pacing })?;
        Ok(path)
    }

    /// Export through an arbitrary sink.
    pub fn start_export_with_sink(
        &mut self,
        sink: Box<dyn FrameSink>,
        opts: ExportOptions,
    ) -> ReelResult<()> {
        if self.is_exporting() {
            return Err(ReelError::playback("an export is already running"));
        }
        let production = self
            .production()
            .ok_or_else(|| ReelError::playback("no production loaded"))?;
        self.stop_preview();
        self.shared.set_cursor(PlaybackCursor::IDLE);
        self.capture = Some(CaptureSession::start(
            Arc::clone(&self.shared),
            production,
            sink,
            opts,
        )?);
        Ok(())
    }

    /// Wait for the running export to finish and return its outcome.
    pub fn finish_export(&mut self) -> ReelResult<ExportOutcome> {
        let capture = self
            .capture
            .take()
            .ok_or_else(|| ReelError::playback("no export running"))?;
        capture.join()
    }

    /// Async form of [`Stage::finish_export`]: the join runs on the blocking pool so the
    /// calling runtime keeps serving other tasks. Dropping the future stops the export.
    pub async fn wait_export(&mut self) -> ReelResult<ExportOutcome> {
        let capture = self
            .capture
            .take()
            .ok_or_else(|| ReelError::playback("no export running"))?;
        let _cancel = StopOnDrop(capture.stop_flag());
        tokio::task::spawn_blocking(move || capture.join())
            .await
            .map_err(|e| ReelError::playback(format!("export join task failed: {e}")))?
    }

    /// Hold time of every line of the loaded production.
    pub fn timeline(&self) -> Option<Timeline> {
        self.production().map(|p| Timeline::from_production(&p))
    }
}

/// Raises the export stop flag when dropped; harmless once the export has ended.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.stop_preview();
        self.capture.take();
    }
}

async fn run_preview(shared: Arc<StageShared>, production: Arc<Production>, epoch: u64) {
    let timeline = Timeline::from_production(&production);
    let len = production.lines.len();
    for (i, line) in production.lines.iter().enumerate() {
        {
            let current = shared.preview_epoch.lock();
            if *current != epoch {
                return;
            }
            let cursor = match PlaybackCursor::line(i, len) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "preview cursor out of range");
                    return;
                }
            };
            shared.set_cursor(cursor);
            if let Err(e) = shared.draw_and_present(cursor) {
                tracing::warn!(error = %e, %cursor, "preview frame failed");
            }
            if let Some(audio) = &line.audio {
                shared.output.play(audio);
            }
        }
        let hold = timeline.hold(i).unwrap_or_default();
        tracing::debug!(line = i, hold_ms = hold.as_millis() as u64, "preview line");
        tokio::time::sleep(hold).await;
    }

    let current = shared.preview_epoch.lock();
    if *current != epoch {
        return;
    }
    shared.set_cursor(PlaybackCursor::IDLE);
    if let Err(e) = shared.draw_and_present(PlaybackCursor::IDLE) {
        tracing::warn!(error = %e, "idle frame failed");
    }
    drop(current);
    tracing::info!("preview finished");
}

#[cfg(test)]
#[path = "../../tests/unit/session/stage.rs"]
mod tests;
