use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{Value, json};

use crate::backend::error::{BackendError, BackendErrorKind};
use crate::backend::{BackendResult, GenerationBackend, ScriptLine};
use crate::config::BackendConfig;
use crate::foundation::core::AspectRatio;
use crate::production::model::{Character, Gender, VoiceId};

/// [`GenerationBackend`] over the Gemini `generateContent` REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    cfg: BackendConfig,
    api_key: String,
}

impl GeminiBackend {
    /// Create a backend with an explicit API key.
    pub fn new(cfg: BackendConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
            api_key: api_key.into(),
        }
    }

    /// Create a backend reading the API key from the environment variable named in `cfg`.
    pub fn from_env(cfg: BackendConfig) -> BackendResult<Self> {
        let key = std::env::var(&cfg.api_key_env).map_err(|_| {
            BackendError::new(
                BackendErrorKind::Auth,
                format!("environment variable {} is not set", cfg.api_key_env),
            )
        })?;
        Ok(Self::new(cfg, key))
    }

    async fn generate(&self, model: &str, body: Value) -> BackendResult<Value> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::transient(format!("request to {model} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::new(
                BackendErrorKind::from_status(status.as_u16()),
                format!("{model} returned {status}: {}", detail.trim()),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::invalid_response(format!("{model} sent invalid json: {e}")))
    }

    async fn generate_json_text(&self, prompt: String) -> BackendResult<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });
        let resp = self.generate(&self.cfg.text_model, body).await?;
        extract_text(&resp)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn synthesize_speech(
        &self,
        text: &str,
        language_hint: &str,
        voice: VoiceId,
        style_hint: Option<&str>,
    ) -> BackendResult<String> {
        let spoken = match style_hint {
            Some(style) => format!("Say {style} (language: {language_hint}): {text}"),
            None => format!("Say (language: {language_hint}): {text}"),
        };
        let body = json!({
            "contents": [{ "parts": [{ "text": spoken }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.as_str() }
                    }
                }
            }
        });
        let resp = self.generate(&self.cfg.speech_model, body).await?;
        extract_inline_data(&resp).map(str::to_owned)
    }

    async fn synthesize_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> BackendResult<Vec<u8>> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
            }
        });
        let resp = self.generate(&self.cfg.image_model, body).await?;
        let data = extract_inline_data(&resp)?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| BackendError::invalid_response(format!("image payload is not base64: {e}")))
    }

    async fn generate_dialogue_script(
        &self,
        topic: &str,
        setting: &str,
        characters: &[Character],
        duration_minutes: u32,
    ) -> BackendResult<Vec<ScriptLine>> {
        let names = characters
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Write a natural spoken dialogue about \"{topic}\" set in {setting}, lasting about \
             {duration_minutes} minute(s) when read aloud. Only these speakers may talk: {names}. \
             Answer with a JSON array of objects with keys \"speaker\" and \"text\"."
        );
        let text = self.generate_json_text(prompt).await?;
        parse_script_json(&text)
    }

    async fn generate_characters(&self, context: &str, count: usize) -> BackendResult<Vec<Character>> {
        let prompt = format!(
            "Invent {count} distinct characters for: {context}. Answer with a JSON array of \
             objects with keys \"name\", \"gender\" (male or female) and \"description\" (their \
             visual appearance)."
        );
        let text = self.generate_json_text(prompt).await?;
        parse_characters_json(&text, count)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

fn parts(resp: &Value) -> BackendResult<&[Value]> {
    resp.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| BackendError::invalid_response("response has no content parts"))
}

/// First `text` among `candidates[0].content.parts`.
pub(crate) fn extract_text(resp: &Value) -> BackendResult<String> {
    parts(resp)?
        .iter()
        .find_map(|p| p.get("text").and_then(Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| BackendError::invalid_response("response has no text part"))
}

/// First `inlineData.data` among `candidates[0].content.parts`; image models may lead with text.
pub(crate) fn extract_inline_data(resp: &Value) -> BackendResult<&str> {
    parts(resp)?
        .iter()
        .find_map(|p| p.get("inlineData").and_then(|d| d.get("data")).and_then(Value::as_str))
        .ok_or_else(|| BackendError::invalid_response("response has no inline data part"))
}

#[derive(serde::Deserialize)]
struct RawCharacter {
    name: String,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    description: String,
}

pub(crate) fn parse_characters_json(text: &str, count: usize) -> BackendResult<Vec<Character>> {
    let raw: Vec<RawCharacter> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BackendError::invalid_response(format!("character list is not valid json: {e}")))?;
    if raw.len() < count {
        return Err(BackendError::invalid_response(format!(
            "asked for {count} characters, got {}",
            raw.len()
        )));
    }
    Ok(raw
        .into_iter()
        .take(count)
        .map(|c| Character {
            name: c.name.trim().to_owned(),
            gender: Gender::parse(&c.gender),
            description: c.description,
        })
        .collect())
}

pub(crate) fn parse_script_json(text: &str) -> BackendResult<Vec<ScriptLine>> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BackendError::invalid_response(format!("script is not valid json: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.trim_start_matches("json");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
#[path = "../../tests/unit/backend/gemini.rs"]
mod tests;
