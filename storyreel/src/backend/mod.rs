//! Generation backend contract.
//!
//! Every model call the production pipeline makes goes through [`GenerationBackend`]. Calls are
//! wrapped by [`retry::Retrier`], which classifies failures by [`error::BackendErrorKind`].

use async_trait::async_trait;

use crate::foundation::core::AspectRatio;
use crate::production::model::{Character, VoiceId};

pub(crate) mod error;
pub(crate) mod gemini;
pub(crate) mod retry;

pub use error::{BackendError, BackendErrorKind};

/// Result type of backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// One scripted line before speech synthesis.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScriptLine {
    /// Speaking character's name.
    pub speaker: String,
    /// Spoken text.
    pub text: String,
}

/// External generative model service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Synthesize speech and return base64-encoded 16-bit mono PCM at
    /// [`crate::SPEECH_SAMPLE_RATE`].
    async fn synthesize_speech(
        &self,
        text: &str,
        language_hint: &str,
        voice: VoiceId,
        style_hint: Option<&str>,
    ) -> BackendResult<String>;

    /// Generate one image and return its encoded bytes.
    async fn synthesize_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> BackendResult<Vec<u8>>;

    /// Write a dialogue between `characters` about `topic`, sized to `duration_minutes`.
    async fn generate_dialogue_script(
        &self,
        topic: &str,
        setting: &str,
        characters: &[Character],
        duration_minutes: u32,
    ) -> BackendResult<Vec<ScriptLine>>;

    /// Invent `count` characters fitting `context`.
    async fn generate_characters(&self, context: &str, count: usize) -> BackendResult<Vec<Character>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
