use crate::foundation::error::{ReelError, ReelResult};

/// Index of the line currently on screen, or idle.
///
/// A cursor can only be built against a known line count, so it never names a line that does
/// not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PlaybackCursor(Option<usize>);

impl PlaybackCursor {
    /// Nothing playing; the idle frame is shown.
    pub const IDLE: PlaybackCursor = PlaybackCursor(None);

    /// Cursor on line `index` of a script with `line_count` lines.
    pub fn line(index: usize, line_count: usize) -> ReelResult<Self> {
        if index >= line_count {
            return Err(ReelError::playback(format!(
                "cursor {index} out of range for {line_count} lines"
            )));
        }
        Ok(Self(Some(index)))
    }

    /// The line index, `None` when idle.
    pub fn index(self) -> Option<usize> {
        self.0
    }

    /// `true` when nothing is playing.
    pub fn is_idle(self) -> bool {
        self.0.is_none()
    }

    /// Signed form with `-1` for idle, as used in logs and persisted state.
    pub fn as_signed(self) -> i64 {
        self.0.map_or(-1, |i| i as i64)
    }
}

impl std::fmt::Display for PlaybackCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(i) => write!(f, "line {i}"),
            None => f.write_str("idle"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/cursor.rs"]
mod tests;
