use crate::backend::error::BackendError;

/// Convenience result type used across storyreel.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid user-provided data or an API used out of order.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed audio/image payloads. Never retried.
    #[error("decode error: {0}")]
    Decode(String),

    /// A generation backend call failed (after retries where applicable).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Errors while laying out or rasterizing a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Errors from frame sinks and the `ffmpeg` child process.
    #[error("encode error: {0}")]
    Encode(String),

    /// Errors while driving preview playback or export capture.
    #[error("playback error: {0}")]
    Playback(String),

    /// Project store failures.
    #[error("store error: {0}")]
    Store(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ReelError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ReelError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ReelError::Playback`] value.
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    /// Build a [`ReelError::Store`] value.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Build a [`ReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` when this error requires the user to pick a different credential.
    pub fn needs_credential(&self) -> bool {
        matches!(self, Self::Backend(e) if e.kind.requires_credential())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
