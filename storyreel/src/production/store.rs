//! Project persistence.
//!
//! A project is a finished production together with the request that produced it and the
//! overlay it was last shown with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;

use crate::audio::wav::SpeechAudio;
use crate::foundation::core::{AspectRatio, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::production::model::{
    Character, DialogueLine, OverlayConfig, Production, ProductionRequest, SceneAsset,
};

/// Stable project identifier (UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ProjectId(uuid::Uuid);

impl ProjectId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse the hyphenated form.
    pub fn parse(s: &str) -> ReelResult<Self> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ReelError::validation(format!("invalid project id '{s}': {e}")))
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Everything needed to reopen a production.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    /// Identifier.
    pub id: ProjectId,
    /// When the project was saved first.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Request the production was generated from.
    pub request: ProductionRequest,
    /// Generated production.
    pub production: Production,
    /// Overlay at save time.
    pub overlay: OverlayConfig,
}

/// Listing entry.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ProjectSummary {
    /// Identifier.
    pub id: ProjectId,
    /// Topic of the request.
    pub topic: String,
    /// Save time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Number of lines.
    pub lines: usize,
    /// Number of lines with speech.
    pub voiced_lines: usize,
}

impl ProjectSummary {
    fn of(p: &Project) -> Self {
        Self {
            id: p.id,
            topic: p.request.topic.clone(),
            created_at: p.created_at,
            lines: p.production.lines.len(),
            voiced_lines: p.production.voiced_lines(),
        }
    }
}

/// Persistence contract for projects.
pub trait ProjectStore: Send + Sync {
    /// Save (or overwrite) `project` and return its id.
    fn save(&self, project: &Project) -> ReelResult<ProjectId>;
    /// Load a saved project.
    fn load(&self, id: &ProjectId) -> ReelResult<Project>;
    /// All saved projects, newest first.
    fn list(&self) -> ReelResult<Vec<ProjectSummary>>;
}

fn newest_first(mut v: Vec<ProjectSummary>) -> Vec<ProjectSummary> {
    v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    v
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn save(&self, project: &Project) -> ReelResult<ProjectId> {
        self.projects.lock().insert(project.id, project.clone());
        Ok(project.id)
    }

    fn load(&self, id: &ProjectId) -> ReelResult<Project> {
        self.projects
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ReelError::store(format!("project {id} not found")))
    }

    fn list(&self) -> ReelResult<Vec<ProjectSummary>> {
        Ok(newest_first(
            self.projects.lock().values().map(ProjectSummary::of).collect(),
        ))
    }
}

const MANIFEST: &str = "project.json";
const SCENE: &str = "scene.bin";
const LOGO: &str = "logo.bin";
const MANIFEST_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct Manifest {
    version: u32,
    id: ProjectId,
    created_at: chrono::DateTime<chrono::Utc>,
    request: ProductionRequest,
    characters: Vec<Character>,
    lines: Vec<ManifestLine>,
    scene_prompt: String,
    aspect_ratio: AspectRatio,
    overlay_text: String,
    overlay_color: Rgba8,
    has_logo: bool,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ManifestLine {
    speaker: String,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
}

fn line_audio_name(i: usize) -> String {
    format!("line_{i:03}.wav")
}

/// One directory per project under a root:
/// `project.json`, `scene.bin`, optional `logo.bin` and one `line_NNN.wav` per voiced line.
#[derive(Clone, Debug)]
pub struct DirProjectStore {
    root: PathBuf,
}

impl DirProjectStore {
    /// Store rooted at `root`; the directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, id: &ProjectId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn read_manifest(dir: &Path) -> ReelResult<Manifest> {
        let path = dir.join(MANIFEST);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read '{}'", path.display()))?;
        let m: Manifest = serde_json::from_str(&text)
            .map_err(|e| ReelError::serde(format!("{}: {e}", path.display())))?;
        if m.version != MANIFEST_VERSION {
            return Err(ReelError::store(format!(
                "{}: unsupported manifest version {}",
                path.display(),
                m.version
            )));
        }
        Ok(m)
    }

    fn write_into(dir: &Path, project: &Project) -> ReelResult<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("create '{}'", dir.display()))?;
        let write = |name: &str, bytes: &[u8]| -> ReelResult<()> {
            let p = dir.join(name);
            std::fs::write(&p, bytes).with_context(|| format!("write '{}'", p.display()))?;
            Ok(())
        };

        let production = &project.production;
        let mut lines = Vec::with_capacity(production.lines.len());
        for (i, line) in production.lines.iter().enumerate() {
            let audio = match &line.audio {
                Some(a) => {
                    let name = line_audio_name(i);
                    write(&name, &a.to_wav())?;
                    Some(name)
                }
                None => None,
            };
            lines.push(ManifestLine {
                speaker: line.speaker.clone(),
                text: line.text.clone(),
                audio,
            });
        }
        write(SCENE, &production.scene.image)?;
        if let Some(logo) = &project.overlay.logo {
            write(LOGO, logo)?;
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            id: project.id,
            created_at: project.created_at,
            request: project.request.clone(),
            characters: production.characters.clone(),
            lines,
            scene_prompt: production.scene.prompt.clone(),
            aspect_ratio: production.aspect_ratio,
            overlay_text: project.overlay.text.clone(),
            overlay_color: project.overlay.text_color,
            has_logo: project.overlay.logo.is_some(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| ReelError::serde(format!("encode manifest: {e}")))?;
        write(MANIFEST, &json)
    }
}

impl ProjectStore for DirProjectStore {
    fn save(&self, project: &Project) -> ReelResult<ProjectId> {
        let dir = self.dir_for(&project.id);
        let staging = self.root.join(format!(".{}.partial", project.id));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .with_context(|| format!("clear '{}'", staging.display()))?;
        }
        if let Err(e) = Self::write_into(&staging, project) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
        if dir.exists() {
            std::fs::remove_dir_all(&dir).with_context(|| format!("replace '{}'", dir.display()))?;
        }
        std::fs::rename(&staging, &dir)
            .with_context(|| format!("move project into '{}'", dir.display()))?;
        tracing::info!(id = %project.id, dir = %dir.display(), "project saved");
        Ok(project.id)
    }

    fn load(&self, id: &ProjectId) -> ReelResult<Project> {
        let dir = self.dir_for(id);
        if !dir.join(MANIFEST).is_file() {
            return Err(ReelError::store(format!("project {id} not found")));
        }
        let m = Self::read_manifest(&dir)?;
        let read = |name: &str| -> ReelResult<Vec<u8>> {
            let p = dir.join(name);
            Ok(std::fs::read(&p).with_context(|| format!("read '{}'", p.display()))?)
        };

        let mut lines = Vec::with_capacity(m.lines.len());
        for l in m.lines {
            let mut line = DialogueLine::new(l.speaker, l.text);
            if let Some(name) = l.audio {
                line.audio = Some(SpeechAudio::from_wav(&read(&name)?)?);
            }
            lines.push(line);
        }
        let logo = if m.has_logo {
            Some(Arc::new(read(LOGO)?))
        } else {
            None
        };

        Ok(Project {
            id: m.id,
            created_at: m.created_at,
            request: m.request,
            production: Production {
                characters: m.characters,
                lines,
                scene: SceneAsset {
                    image: Arc::new(read(SCENE)?),
                    prompt: m.scene_prompt,
                },
                aspect_ratio: m.aspect_ratio,
            },
            overlay: OverlayConfig {
                text: m.overlay_text,
                text_color: m.overlay_color,
                logo,
            },
        })
    }

    fn list(&self) -> ReelResult<Vec<ProjectSummary>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ReelError::store(format!(
                    "list '{}': {e}",
                    self.root.display()
                )));
            }
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.join(MANIFEST).is_file() {
                continue;
            }
            match Self::read_manifest(&dir) {
                Ok(m) => out.push(ProjectSummary {
                    id: m.id,
                    topic: m.request.topic,
                    created_at: m.created_at,
                    lines: m.lines.len(),
                    voiced_lines: m.lines.iter().filter(|l| l.audio.is_some()).count(),
                }),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable project"),
            }
        }
        Ok(newest_first(out))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/production/store.rs"]
mod tests;
