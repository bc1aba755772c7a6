//! Export encoding sinks.
//!
//! Sinks consume rendered frames in timeline order and are driven by the export capture thread.

/// `ffmpeg`-based sinks (MP4 or WebM output via system `ffmpeg`).
pub mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
