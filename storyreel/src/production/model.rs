use std::sync::Arc;
use std::time::Duration;

use crate::audio::wav::SpeechAudio;
use crate::foundation::core::{AspectRatio, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};

/// Declared gender of a character, used only to pick a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male voice.
    Male,
    /// Female voice.
    Female,
    /// Anything not recognized.
    #[default]
    Unspecified,
}

impl Gender {
    /// Parse a free-form gender word.
    ///
    /// Only whole, known words are recognized; everything else is [`Gender::Unspecified`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "male" | "man" | "boy" | "m" | "masculine" => Self::Male,
            "female" | "woman" | "girl" | "f" | "feminine" => Self::Female,
            _ => Self::Unspecified,
        }
    }

    /// Voice used for this gender. Unspecified falls back to [`VoiceId::DEFAULT`].
    pub fn voice(self) -> VoiceId {
        match self {
            Self::Male => VoiceId::Puck,
            Self::Female => VoiceId::Kore,
            Self::Unspecified => VoiceId::DEFAULT,
        }
    }
}

/// Canonical prebuilt speech voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum VoiceId {
    /// Female-presenting voice.
    Kore,
    /// Male-presenting voice.
    Puck,
}

impl VoiceId {
    /// Voice used when the speaker's gender is unknown.
    pub const DEFAULT: VoiceId = VoiceId::Kore;

    /// Backend voice name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
        }
    }
}

/// A cast member.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Character {
    /// Display and speaker name.
    pub name: String,
    /// Voice selector.
    #[serde(default)]
    pub gender: Gender,
    /// Visual description used for the scene image.
    #[serde(default)]
    pub description: String,
}

impl Character {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, gender: Gender, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gender,
            description: description.into(),
        }
    }
}

/// One speaker-attributed line of the script.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueLine {
    /// Name of the speaking character.
    pub speaker: String,
    /// Spoken text.
    pub text: String,
    /// Decoded speech, absent when synthesis failed.
    pub audio: Option<SpeechAudio>,
}

impl DialogueLine {
    /// Line without audio.
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            audio: None,
        }
    }

    /// Speech length, when audio is present.
    pub fn duration(&self) -> Option<Duration> {
        self.audio.as_ref().map(SpeechAudio::duration)
    }
}

/// Background image shared by every line of a production.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneAsset {
    /// Encoded image bytes (PNG/JPEG/WebP) as returned by the backend.
    pub image: Arc<Vec<u8>>,
    /// Prompt the image was generated from.
    pub prompt: String,
}

/// User-editable caption and logo drawn over every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayConfig {
    /// Caption text; empty disables the caption.
    pub text: String,
    /// Caption fill color.
    pub text_color: Rgba8,
    /// Encoded logo image (raster or SVG).
    pub logo: Option<Arc<Vec<u8>>>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            text_color: Rgba8::rgb(255, 255, 255),
            logo: None,
        }
    }
}

/// One complete generated unit: cast, script with speech, and background.
#[derive(Clone, Debug, PartialEq)]
pub struct Production {
    /// Cast in staging order; the first character is placed on the left.
    pub characters: Vec<Character>,
    /// Lines in playback order.
    pub lines: Vec<DialogueLine>,
    /// Shared background.
    pub scene: SceneAsset,
    /// Orientation the scene was generated for.
    pub aspect_ratio: AspectRatio,
}

impl Production {
    /// Return `true` when `speaker` is staged on the left (first character).
    pub fn speaker_on_left(&self, speaker: &str) -> bool {
        self.characters
            .first()
            .is_some_and(|c| c.name.eq_ignore_ascii_case(speaker.trim()))
    }

    /// Number of lines carrying decoded audio.
    pub fn voiced_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.audio.is_some()).count()
    }
}

/// How the cast of a production is obtained.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastRequest {
    /// Ask the backend for this many characters (1..=4).
    Generate(usize),
    /// Use these characters as-is.
    Explicit(Vec<Character>),
}

/// Inputs of one "Generate" action.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProductionRequest {
    /// What the dialogue is about.
    pub topic: String,
    /// Where it takes place.
    #[serde(default)]
    pub setting: String,
    /// Cast source.
    pub cast: CastRequest,
    /// Target spoken length.
    pub duration_minutes: u32,
    /// Canvas orientation.
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Language the script and speech should use.
    #[serde(default = "default_language_hint")]
    pub language_hint: String,
}

fn default_language_hint() -> String {
    "en".to_owned()
}

impl ProductionRequest {
    /// Largest cast a production supports.
    pub const MAX_CHARACTERS: usize = 4;

    /// Request with a generated cast of `count` characters.
    pub fn new(topic: impl Into<String>, setting: impl Into<String>, count: usize) -> Self {
        Self {
            topic: topic.into(),
            setting: setting.into(),
            cast: CastRequest::Generate(count),
            duration_minutes: 1,
            aspect_ratio: AspectRatio::default(),
            language_hint: default_language_hint(),
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> ReelResult<()> {
        if self.topic.trim().is_empty() {
            return Err(ReelError::validation("topic must not be empty"));
        }
        if self.duration_minutes == 0 {
            return Err(ReelError::validation("duration_minutes must be >= 1"));
        }
        match &self.cast {
            CastRequest::Generate(n) if !(1..=Self::MAX_CHARACTERS).contains(n) => {
                Err(ReelError::validation(format!(
                    "character count must be within 1..={}, got {n}",
                    Self::MAX_CHARACTERS
                )))
            }
            CastRequest::Explicit(cast) if cast.is_empty() || cast.len() > Self::MAX_CHARACTERS => {
                Err(ReelError::validation(format!(
                    "explicit cast must have 1..={} characters, got {}",
                    Self::MAX_CHARACTERS,
                    cast.len()
                )))
            }
            CastRequest::Explicit(cast) => {
                for (i, c) in cast.iter().enumerate() {
                    if c.name.trim().is_empty() {
                        return Err(ReelError::validation(format!("character {i} has no name")));
                    }
                    if cast[..i].iter().any(|o| o.name.trim().eq_ignore_ascii_case(c.name.trim())) {
                        return Err(ReelError::validation(format!(
                            "duplicate character name '{}'",
                            c.name
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/production/model.rs"]
mod tests;
