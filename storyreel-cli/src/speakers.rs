//! Preview output on the default audio device.

use std::sync::mpsc;

use anyhow::Context as _;
use rodio::buffer::SamplesBuffer;

use storyreel::{FrameRGBA, PlaybackCursor, PreviewOutput, SpeechAudio};

enum AudioCommand {
    Play(SamplesBuffer),
    Stop,
}

/// Plays line audio through the speakers and prints each line as it is shown.
///
/// The output stream is owned by a dedicated thread; it is not `Send` on every platform.
pub struct RodioPreview {
    commands: mpsc::Sender<AudioCommand>,
    captions: Vec<String>,
}

impl RodioPreview {
    /// Open the default output device. `captions[i]` is printed when line `i` is presented.
    pub fn open(captions: Vec<String>) -> anyhow::Result<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("storyreel-audio".to_owned())
            .spawn(move || {
                let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::anyhow!("open audio output: {e}")));
                        return;
                    }
                };
                let sink = rodio::Sink::connect_new(stream.mixer());
                let _ = ready_tx.send(Ok(()));
                for cmd in rx {
                    match cmd {
                        AudioCommand::Play(buffer) => sink.append(buffer),
                        AudioCommand::Stop => sink.stop(),
                    }
                }
                tracing::debug!("audio output closed");
            })
            .context("spawn audio thread")?;
        ready_rx
            .recv()
            .context("audio thread exited during startup")??;
        Ok(Self { commands, captions })
    }

    fn send(&self, cmd: AudioCommand) {
        if self.commands.send(cmd).is_err() {
            tracing::warn!("audio thread is gone");
        }
    }
}

impl PreviewOutput for RodioPreview {
    fn present(&self, cursor: PlaybackCursor, _frame: &FrameRGBA) {
        if let Some(caption) = cursor.index().and_then(|i| self.captions.get(i)) {
            println!("{caption}");
        }
        tracing::debug!(%cursor, "presented");
    }

    fn play(&self, audio: &SpeechAudio) {
        self.send(AudioCommand::Play(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.to_f32(),
        )));
    }

    fn stop_audio(&self) {
        self.send(AudioCommand::Stop);
    }
}
