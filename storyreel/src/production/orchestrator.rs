//! Turns a [`ProductionRequest`] into a [`Production`].
//!
//! Backend calls are issued strictly one after another: characters, script, scene image, then
//! one speech call per line. Progress is published as a [`ProductionStage`] on a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::audio::wav::{SPEECH_SAMPLE_RATE, SpeechAudio};
use crate::backend::retry::Retrier;
use crate::backend::{BackendError, BackendResult, GenerationBackend, ScriptLine};
use crate::foundation::core::AspectRatio;
use crate::foundation::error::{ReelError, ReelResult};
use crate::production::model::{
    CastRequest, Character, DialogueLine, OverlayConfig, Production, ProductionRequest, SceneAsset,
    VoiceId,
};
use crate::production::store::{Project, ProjectId, ProjectStore};

/// Where the orchestrator is in producing the current request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProductionStage {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Inventing the cast.
    GeneratingCharacters,
    /// Writing the dialogue.
    GeneratingScript,
    /// Painting the background.
    GeneratingScene,
    /// Synthesizing speech for line `line` (0-based) of `total`.
    GeneratingAudio {
        /// Current line.
        line: usize,
        /// Line count.
        total: usize,
    },
    /// A production is available.
    Ready,
    /// The last request failed.
    Error(String),
}

impl ProductionStage {
    /// Human-readable status line.
    pub fn progress_text(&self) -> String {
        match self {
            Self::Idle => "Idle".to_owned(),
            Self::GeneratingCharacters => "Creating characters...".to_owned(),
            Self::GeneratingScript => "Writing the script...".to_owned(),
            Self::GeneratingScene => "Painting the scene...".to_owned(),
            Self::GeneratingAudio { line, total } => {
                format!("Recording line {} of {total}...", line + 1)
            }
            Self::Ready => "Ready".to_owned(),
            Self::Error(msg) => format!("Error: {msg}"),
        }
    }

    /// `true` while a request is being produced.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Ready | Self::Error(_))
    }
}

/// Describe the scene for the image model.
///
/// The first character is staged on the left and everyone else on the right, matching where
/// their speech bubbles are drawn.
pub fn scene_prompt(
    topic: &str,
    setting: &str,
    characters: &[Character],
    aspect_ratio: AspectRatio,
) -> String {
    let mut prompt = format!(
        "A {} illustration for a dialogue scene about \"{}\".",
        aspect_ratio.orientation_hint(),
        topic.trim()
    );
    if !setting.trim().is_empty() {
        prompt.push_str(&format!(" Setting: {}.", setting.trim()));
    }
    for (i, c) in characters.iter().enumerate() {
        let side = if i == 0 { "on the left" } else { "on the right" };
        let description = if c.description.trim().is_empty() {
            String::new()
        } else {
            format!(", {}", c.description.trim())
        };
        prompt.push_str(&format!(" {side}: {}{description}.", c.name));
    }
    prompt.push_str(
        " Leave the upper part of the frame uncluttered. No text, captions or speech bubbles.",
    );
    prompt
}

fn resolve_speakers(script: Vec<ScriptLine>, cast: &[Character]) -> BackendResult<Vec<DialogueLine>> {
    if script.is_empty() {
        return Err(BackendError::invalid_response("script has no lines"));
    }
    script
        .into_iter()
        .enumerate()
        .map(|(i, l)| {
            let c = cast
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(l.speaker.trim()))
                .ok_or_else(|| {
                    BackendError::invalid_response(format!(
                        "line {i} names unknown speaker '{}'",
                        l.speaker
                    ))
                })?;
            if l.text.trim().is_empty() {
                return Err(BackendError::invalid_response(format!("line {i} is empty")));
            }
            Ok(DialogueLine::new(c.name.clone(), l.text.trim()))
        })
        .collect()
}

fn check_cast(mut cast: Vec<Character>, count: usize) -> BackendResult<Vec<Character>> {
    cast.truncate(count);
    if cast.len() < count {
        return Err(BackendError::invalid_response(format!(
            "asked for {count} characters, got {}",
            cast.len()
        )));
    }
    for (i, c) in cast.iter().enumerate() {
        if c.name.trim().is_empty() {
            return Err(BackendError::invalid_response(format!("character {i} has no name")));
        }
        if cast[..i].iter().any(|o| o.name.eq_ignore_ascii_case(&c.name)) {
            return Err(BackendError::invalid_response(format!(
                "duplicate character name '{}'",
                c.name
            )));
        }
    }
    Ok(cast)
}

/// Clears the busy flag when `produce` returns or is dropped mid-flight.
struct BusyGuard<'a>(&'a Orchestrator);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.0.stage().is_busy() {
            self.0.set_stage(ProductionStage::Error("cancelled".to_owned()));
        }
        self.0.busy.store(false, Ordering::Release);
    }
}

/// Drives the generation pipeline and keeps the latest result.
pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    retrier: Retrier,
    stage: watch::Sender<ProductionStage>,
    busy: AtomicBool,
    current: Mutex<Option<(ProductionRequest, Production)>>,
    store: Option<Arc<dyn ProjectStore>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backend", &self.backend.name())
            .field("retrier", &self.retrier)
            .field("stage", &*self.stage.borrow())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over `backend`, retrying with `retrier`.
    pub fn new(backend: Arc<dyn GenerationBackend>, retrier: Retrier) -> Self {
        let (stage, _) = watch::channel(ProductionStage::Idle);
        Self {
            backend,
            retrier,
            stage,
            busy: AtomicBool::new(false),
            current: Mutex::new(None),
            store: None,
        }
    }

    /// Attach a project store for [`Self::save_current`] and [`Self::load`].
    pub fn with_store(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current stage.
    pub fn stage(&self) -> ProductionStage {
        self.stage.borrow().clone()
    }

    /// Receiver notified on every stage change.
    pub fn subscribe(&self) -> watch::Receiver<ProductionStage> {
        self.stage.subscribe()
    }

    /// Latest production, if any.
    pub fn current(&self) -> Option<Production> {
        self.current.lock().as_ref().map(|(_, p)| p.clone())
    }

    fn set_stage(&self, stage: ProductionStage) {
        tracing::info!(stage = %stage.progress_text(), "production stage");
        self.stage.send_replace(stage);
    }

    /// Return to [`ProductionStage::Idle`] from `Ready` or `Error`.
    pub fn reset(&self) -> ReelResult<()> {
        let stage = self.stage();
        if stage.is_busy() {
            return Err(ReelError::validation("cannot reset while a production is running"));
        }
        if stage != ProductionStage::Idle {
            self.set_stage(ProductionStage::Idle);
        }
        Ok(())
    }

    /// Generate a complete production, replacing the previous one.
    #[tracing::instrument(
        name = "produce",
        skip(self, request),
        fields(topic = %request.topic, backend = self.backend.name())
    )]
    pub async fn produce(&self, request: ProductionRequest) -> ReelResult<Production> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReelError::validation("a production is already running"));
        }
        let _busy = BusyGuard(self);
        let result = match request.validate() {
            Ok(()) => self.run_pipeline(&request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(production) => {
                tracing::info!(
                    lines = production.lines.len(),
                    voiced = production.voiced_lines(),
                    "production ready"
                );
                *self.current.lock() = Some((request, production.clone()));
                self.set_stage(ProductionStage::Ready);
                Ok(production)
            }
            Err(e) => {
                self.set_stage(ProductionStage::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, request: &ProductionRequest) -> ReelResult<Production> {
        let backend = self.backend.as_ref();
        let topic = request.topic.as_str();
        let setting = request.setting.as_str();

        let cast = match &request.cast {
            CastRequest::Explicit(cast) => cast.clone(),
            CastRequest::Generate(count) => {
                self.set_stage(ProductionStage::GeneratingCharacters);
                let count = *count;
                let context = if setting.trim().is_empty() {
                    topic.to_owned()
                } else {
                    format!("{topic} (setting: {setting})")
                };
                let context = context.as_str();
                self.retrier
                    .run("generate_characters", move || async move {
                        check_cast(backend.generate_characters(context, count).await?, count)
                    })
                    .await?
            }
        };

        self.set_stage(ProductionStage::GeneratingScript);
        let cast_ref = cast.as_slice();
        let minutes = request.duration_minutes;
        let mut lines = self
            .retrier
            .run("generate_dialogue_script", move || async move {
                let script = backend
                    .generate_dialogue_script(topic, setting, cast_ref, minutes)
                    .await?;
                resolve_speakers(script, cast_ref)
            })
            .await?;

        self.set_stage(ProductionStage::GeneratingScene);
        let prompt = scene_prompt(topic, setting, &cast, request.aspect_ratio);
        let prompt_ref = prompt.as_str();
        let aspect_ratio = request.aspect_ratio;
        let image = self
            .retrier
            .run("synthesize_image", move || {
                backend.synthesize_image(prompt_ref, aspect_ratio)
            })
            .await?;
        if image.is_empty() {
            return Err(BackendError::invalid_response("scene image is empty").into());
        }

        let total = lines.len();
        let language = request.language_hint.as_str();
        for (i, line) in lines.iter_mut().enumerate() {
            self.set_stage(ProductionStage::GeneratingAudio { line: i, total });
            let voice = cast
                .iter()
                .find(|c| c.name == line.speaker)
                .map_or(VoiceId::DEFAULT, |c| c.gender.voice());
            let text = line.text.as_str();
            let speech = self
                .retrier
                .run("synthesize_speech", move || {
                    backend.synthesize_speech(text, language, voice, None)
                })
                .await
                .map_err(ReelError::from)
                .and_then(|b64| SpeechAudio::from_base64_pcm(&b64, SPEECH_SAMPLE_RATE, 1));
            match speech {
                Ok(audio) => line.audio = Some(audio),
                Err(e) => {
                    tracing::warn!(line = i, speaker = %line.speaker, error = %e, "line left without audio")
                }
            }
        }

        Ok(Production {
            characters: cast,
            lines,
            scene: SceneAsset {
                image: Arc::new(image),
                prompt,
            },
            aspect_ratio: request.aspect_ratio,
        })
    }

    /// Persist the current production with `overlay`.
    pub fn save_current(&self, overlay: &OverlayConfig) -> ReelResult<ProjectId> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ReelError::store("no project store configured"))?;
        let (request, production) = self
            .current
            .lock()
            .clone()
            .ok_or_else(|| ReelError::store("nothing produced yet"))?;
        store.save(&Project {
            id: ProjectId::new(),
            created_at: chrono::Utc::now(),
            request,
            production,
            overlay: overlay.clone(),
        })
    }

    /// Load a saved project and make it current.
    pub fn load(&self, id: &ProjectId) -> ReelResult<Project> {
        if self.stage().is_busy() {
            return Err(ReelError::validation("cannot load while a production is running"));
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ReelError::store("no project store configured"))?;
        let project = store.load(id)?;
        *self.current.lock() = Some((project.request.clone(), project.production.clone()));
        self.set_stage(ProductionStage::Ready);
        Ok(project)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/production/orchestrator.rs"]
mod tests;
