use crate::audio::wav::SpeechAudio;
use crate::foundation::error::{ReelError, ReelResult};
use std::path::Path;

/// Output sample rate of the export mix.
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Output channel count of the export mix.
pub const MIX_CHANNELS: u16 = 2;

/// One line's speech placed on the export timeline.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MixSegment<'a> {
    pub(crate) start_sec: f64,
    pub(crate) audio: &'a SpeechAudio,
}

/// Mix segments into interleaved stereo `f32` PCM covering `total_secs`.
pub(crate) fn mix_segments(segments: &[MixSegment<'_>], total_secs: f64) -> Vec<f32> {
    let frames = (total_secs.max(0.0) * f64::from(MIX_SAMPLE_RATE)).ceil() as usize;
    let mut out = vec![0.0f32; frames * usize::from(MIX_CHANNELS)];

    for seg in segments {
        mix_segment(&mut out, seg);
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

fn mix_segment(out: &mut [f32], seg: &MixSegment<'_>) {
    let src = seg.audio.samples.as_slice();
    let src_channels = usize::from(seg.audio.channels);
    let src_frames = seg.audio.frames();
    if src_frames == 0 {
        return;
    }

    let out_frames = out.len() / usize::from(MIX_CHANNELS);
    let start = (seg.start_sec.max(0.0) * f64::from(MIX_SAMPLE_RATE)).round() as usize;
    let ratio = f64::from(seg.audio.sample_rate) / f64::from(MIX_SAMPLE_RATE);
    let sample = |frame: usize, ch: usize| -> f32 {
        let ch = ch.min(src_channels - 1);
        f32::from(src[frame * src_channels + ch]) / 32_768.0
    };

    for dst_frame in start..out_frames {
        let src_pos = (dst_frame - start) as f64 * ratio;
        let f0 = src_pos.floor() as usize;
        if f0 >= src_frames {
            break;
        }
        let f1 = (f0 + 1).min(src_frames - 1);
        let frac = (src_pos - f0 as f64) as f32;

        let dst = dst_frame * usize::from(MIX_CHANNELS);
        for ch in 0..usize::from(MIX_CHANNELS) {
            let v0 = sample(f0, ch);
            let v1 = sample(f1, ch);
            out[dst + ch] += v0 + (v1 - v0) * frac;
        }
    }
}

/// Write interleaved `f32` PCM samples to raw little-endian `.f32le` file.
pub(crate) fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ReelResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelError::encode(format!(
                "failed to create audio mix output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ReelError::encode(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
