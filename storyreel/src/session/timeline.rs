use std::time::Duration;

use crate::foundation::core::Fps;
use crate::production::model::{DialogueLine, Production};
use crate::session::cursor::PlaybackCursor;

/// Silence appended after a line's speech before the next line starts.
pub const SPEECH_TAIL: Duration = Duration::from_millis(500);

/// Hold time for a line whose speech is missing.
pub const SILENT_HOLD: Duration = Duration::from_millis(3000);

/// How long `line` stays on screen.
pub fn hold_for(line: &DialogueLine) -> Duration {
    match line.duration() {
        Some(d) => d + SPEECH_TAIL,
        None => SILENT_HOLD,
    }
}

/// Start time and hold of every line, in playback order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    starts: Vec<Duration>,
    holds: Vec<Duration>,
    total: Duration,
}

impl Timeline {
    /// Schedule for `production`.
    pub fn from_production(production: &Production) -> Self {
        Self::from_lines(&production.lines)
    }

    /// Schedule for `lines`.
    pub fn from_lines(lines: &[DialogueLine]) -> Self {
        let mut starts = Vec::with_capacity(lines.len());
        let mut holds = Vec::with_capacity(lines.len());
        let mut t = Duration::ZERO;
        for line in lines {
            let hold = hold_for(line);
            starts.push(t);
            holds.push(hold);
            t += hold;
        }
        Self {
            starts,
            holds,
            total: t,
        }
    }

    /// Number of scheduled lines.
    pub fn len(&self) -> usize {
        self.holds.len()
    }

    /// `true` when there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    /// Hold of line `i`.
    pub fn hold(&self, i: usize) -> Option<Duration> {
        self.holds.get(i).copied()
    }

    /// Start time of line `i`.
    pub fn start(&self, i: usize) -> Option<Duration> {
        self.starts.get(i).copied()
    }

    /// End of the last line.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Line on screen at `t`; idle before any line and from the end on.
    pub fn line_at(&self, t: Duration) -> PlaybackCursor {
        if t >= self.total {
            return PlaybackCursor::IDLE;
        }
        let after = self.starts.partition_point(|s| *s <= t);
        match after.checked_sub(1) {
            Some(i) => PlaybackCursor::line(i, self.len()).unwrap_or(PlaybackCursor::IDLE),
            None => PlaybackCursor::IDLE,
        }
    }

    /// Frames needed to record the whole timeline at `fps`.
    pub fn frame_count(&self, fps: Fps) -> u64 {
        fps.secs_to_frames_ceil(self.total.as_secs_f64())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/timeline.rs"]
mod tests;
