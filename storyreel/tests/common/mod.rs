#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;

use storyreel::{
    AspectRatio, BackendError, BackendErrorKind, BackendResult, Character, DialogueLine,
    FrameRGBA, Gender, GenerationBackend, PlaybackCursor, PreviewOutput, Production,
    SPEECH_SAMPLE_RATE, SceneAsset, ScriptLine, SpeechAudio, VoiceId,
};

/// Backend answering from a fixed cast and script.
///
/// Speech for a line is `seconds_per_line` of 24 kHz mono PCM; lines whose index is in
/// `failing_lines` always fail.
pub struct ScriptedBackend {
    pub cast: Vec<Character>,
    pub script: Vec<ScriptLine>,
    pub seconds_per_line: f64,
    pub failing_lines: HashSet<usize>,
    pub image_calls: AtomicUsize,
    pub speech_calls: Mutex<Vec<(String, VoiceId)>>,
}

impl ScriptedBackend {
    pub fn doctor_visit(lines: usize) -> Self {
        let cast = vec![
            Character::new("Anna", Gender::Female, "a family doctor"),
            Character::new("Ben", Gender::Male, "a nervous patient"),
        ];
        let script = (0..lines)
            .map(|i| ScriptLine {
                speaker: cast[i % 2].name.clone(),
                text: format!("Line number {i} of the visit."),
            })
            .collect();
        Self {
            cast,
            script,
            seconds_per_line: 1.0,
            failing_lines: HashSet::new(),
            image_calls: AtomicUsize::new(0),
            speech_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.failing_lines.insert(index);
        self
    }

    fn line_index(&self, text: &str) -> Option<usize> {
        self.script.iter().position(|l| l.text == text)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn synthesize_speech(
        &self,
        text: &str,
        _language_hint: &str,
        voice: VoiceId,
        _style_hint: Option<&str>,
    ) -> BackendResult<String> {
        self.speech_calls.lock().push((text.to_owned(), voice));
        if self
            .line_index(text)
            .is_some_and(|i| self.failing_lines.contains(&i))
        {
            return Err(BackendError::new(
                BackendErrorKind::Transient,
                "speech service unavailable",
            ));
        }
        let frames = (self.seconds_per_line * f64::from(SPEECH_SAMPLE_RATE)).round() as usize;
        Ok(pcm_base64(frames))
    }

    async fn synthesize_image(&self, _prompt: &str, aspect_ratio: AspectRatio) -> BackendResult<Vec<u8>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let (w, h) = match aspect_ratio {
            AspectRatio::Landscape => (64, 36),
            AspectRatio::Portrait => (36, 64),
            AspectRatio::Square => (48, 48),
        };
        Ok(png(w, h, [30, 120, 200, 255]))
    }

    async fn generate_dialogue_script(
        &self,
        _topic: &str,
        _setting: &str,
        _characters: &[Character],
        _duration_minutes: u32,
    ) -> BackendResult<Vec<ScriptLine>> {
        Ok(self.script.clone())
    }

    async fn generate_characters(&self, _context: &str, count: usize) -> BackendResult<Vec<Character>> {
        Ok(self.cast.iter().take(count).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn pcm_base64(frames: usize) -> String {
    let bytes: Vec<u8> = (0..frames)
        .flat_map(|i| (((i % 64) as i16 - 32) * 256).to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// One `present` call as seen by [`RecordingPreview`].
#[derive(Clone, Copy, Debug)]
pub struct Presented {
    pub cursor: PlaybackCursor,
    pub at: tokio::time::Instant,
    pub size: (u32, u32),
}

/// Preview output keeping every presented cursor and played clip.
#[derive(Default)]
pub struct RecordingPreview {
    pub presented: Mutex<Vec<Presented>>,
    pub played: Mutex<Vec<std::time::Duration>>,
    pub audio_stops: AtomicUsize,
}

impl RecordingPreview {
    pub fn presented_since(&self, start: usize) -> Vec<Presented> {
        self.presented.lock()[start..].to_vec()
    }

    pub fn presented_count(&self) -> usize {
        self.presented.lock().len()
    }
}

impl PreviewOutput for RecordingPreview {
    fn present(&self, cursor: PlaybackCursor, frame: &FrameRGBA) {
        self.presented.lock().push(Presented {
            cursor,
            at: tokio::time::Instant::now(),
            size: (frame.width, frame.height),
        });
    }

    fn play(&self, audio: &SpeechAudio) {
        self.played.lock().push(audio.duration());
    }

    fn stop_audio(&self) {
        self.audio_stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn recording() -> Arc<RecordingPreview> {
    Arc::new(RecordingPreview::default())
}

/// Two-person production; line `i` carries `voiced_secs[i]` of audio when `Some`.
pub fn production(voiced_secs: &[Option<f64>]) -> Production {
    let characters = vec![
        Character::new("Anna", Gender::Female, "a family doctor"),
        Character::new("Ben", Gender::Male, "a nervous patient"),
    ];
    let lines = voiced_secs
        .iter()
        .enumerate()
        .map(|(i, secs)| {
            let mut line = DialogueLine::new(
                characters[i % 2].name.clone(),
                format!("Line number {i} of the visit."),
            );
            line.audio = secs.map(|s| {
                let frames = (s * f64::from(SPEECH_SAMPLE_RATE)).round() as usize;
                SpeechAudio::new(vec![1_000; frames], SPEECH_SAMPLE_RATE, 1).expect("speech audio")
            });
            line
        })
        .collect();
    Production {
        characters,
        lines,
        scene: SceneAsset {
            image: Arc::new(png(64, 36, [30, 120, 200, 255])),
            prompt: "a small clinic".to_owned(),
        },
        aspect_ratio: AspectRatio::Landscape,
    }
}
