//! Studio configuration, loaded from JSON with every field defaulted.

use std::path::{Path, PathBuf};

use crate::backend::retry::RetryPolicy;
use crate::foundation::core::{AspectRatio, ExportResolution};
use crate::foundation::error::{ReelError, ReelResult};

/// Generation backend endpoint and model selection.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// REST base URL (without trailing `/models`).
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Model used for characters and scripts.
    pub text_model: String,
    /// Model used for scene images.
    pub image_model: String,
    /// Model used for speech.
    pub speech_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            api_key_env: "STORYREEL_API_KEY".to_owned(),
            text_model: "gemini-2.5-flash".to_owned(),
            image_model: "gemini-2.5-flash-image".to_owned(),
            speech_model: "gemini-2.5-flash-preview-tts".to_owned(),
        }
    }
}

/// Compositor and export defaults.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// TrueType/OpenType font used for bubbles and captions.
    pub font_path: PathBuf,
    /// Orientation for new productions.
    pub aspect_ratio: AspectRatio,
    /// Export resolution preset.
    pub export_resolution: ExportResolution,
    /// Default caption text.
    pub caption: String,
    /// Default caption color (`#rrggbb`).
    pub caption_color: String,
    /// Optional logo file drawn top-right.
    pub logo_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            aspect_ratio: AspectRatio::default(),
            export_resolution: ExportResolution::default(),
            caption: String::new(),
            caption_color: "#ffffff".to_owned(),
            logo_path: None,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Backend endpoint.
    pub backend: BackendConfig,
    /// Retry policy for every backend call.
    pub retry: RetryPolicy,
    /// Rendering defaults.
    pub render: RenderConfig,
    /// Root directory of the project store.
    pub store_dir: PathBuf,
}

impl StudioConfig {
    /// Parse a JSON configuration string.
    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        serde_json::from_str(s).map_err(|e| ReelError::serde(format!("invalid config json: {e}")))
    }

    /// Load a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| {
            ReelError::validation(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    /// Load `path` when given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> ReelResult<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Ok(Self::default()),
        }
    }

    /// Project store root, defaulting to `./storyreel-projects`.
    pub fn store_root(&self) -> PathBuf {
        if self.store_dir.as_os_str().is_empty() {
            PathBuf::from("storyreel-projects")
        } else {
            self.store_dir.clone()
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
