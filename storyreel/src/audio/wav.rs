//! Speech payload decoding and WAV packaging.
//!
//! Generation backends return speech as base64-encoded 16-bit little-endian PCM without any
//! container. [`SpeechAudio`] is the decoded form carried on each dialogue line.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Sample rate of speech payloads returned by the generation backend.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Size of the canonical PCM WAV header produced by [`pcm_to_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Decode a standard (padded) base64 string.
pub fn decode_base64_to_bytes(base64: &str) -> ReelResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(base64.trim())
        .map_err(|e| ReelError::decode(format!("malformed base64 audio payload: {e}")))
}

/// Reinterpret little-endian 16-bit PCM bytes as samples.
pub fn pcm_s16le_to_samples(bytes: &[u8]) -> ReelResult<Vec<i16>> {
    if !bytes.len().is_multiple_of(2) {
        return Err(ReelError::decode(format!(
            "16-bit PCM payload has odd byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Package PCM samples into a self-contained RIFF/WAVE container.
///
/// The output is exactly `44 + samples.len() * bits_per_sample / 8` bytes. 8-bit output keeps the
/// high byte as offset binary; 24/32-bit output left-aligns each sample. Depths other than
/// 8, 16, 24 and 32 bits are rejected.
pub fn pcm_to_wav(
    samples: &[i16],
    channels: u16,
    sample_rate_hz: u32,
    bits_per_sample: u16,
) -> ReelResult<Vec<u8>> {
    if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
        return Err(ReelError::validation(format!(
            "unsupported wav bit depth {bits_per_sample}, expected 8, 16, 24 or 32"
        )));
    }
    if channels == 0 || sample_rate_hz == 0 {
        return Err(ReelError::validation(
            "wav channels and sample rate must be non-zero",
        ));
    }
    Ok(write_wav(samples, channels, sample_rate_hz, bits_per_sample))
}

fn write_wav(samples: &[i16], channels: u16, sample_rate_hz: u32, bits_per_sample: u16) -> Vec<u8> {
    let bytes_per_sample = usize::from(bits_per_sample / 8);
    let data_len = samples.len() * bytes_per_sample;
    let byte_rate = sample_rate_hz * u32::from(channels) * u32::from(bits_per_sample / 8);
    let block_align = channels * (bits_per_sample / 8);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate_hz.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    for &s in samples {
        match bytes_per_sample {
            1 => out.push(((s >> 8) as i8 as u8) ^ 0x80),
            n => {
                let widened = i32::from(s) << (8 * (n - 2));
                out.extend_from_slice(&widened.to_le_bytes()[..n]);
            }
        }
    }
    out
}

/// Decoded speech for one dialogue line.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechAudio {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Interleaved 16-bit samples.
    pub samples: Arc<Vec<i16>>,
}

impl SpeechAudio {
    /// Wrap already decoded samples.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> ReelResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(ReelError::decode(
                "speech audio sample_rate/channels must be non-zero",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        })
    }

    /// Decode a backend speech payload (base64 16-bit PCM).
    pub fn from_base64_pcm(base64: &str, sample_rate: u32, channels: u16) -> ReelResult<Self> {
        let bytes = decode_base64_to_bytes(base64)?;
        if bytes.is_empty() {
            return Err(ReelError::decode("speech payload is empty"));
        }
        Self::new(pcm_s16le_to_samples(&bytes)?, sample_rate, channels)
    }

    /// Parse a 16-bit PCM WAV file.
    pub fn from_wav(bytes: &[u8]) -> ReelResult<Self> {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| ReelError::decode(format!("invalid wav: {e}")))?;
        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(ReelError::decode(format!(
                "expected 16-bit integer wav, got {} bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReelError::decode(format!("invalid wav samples: {e}")))?;
        Self::new(samples, spec.sample_rate, spec.channels)
    }

    /// Encode as a 16-bit PCM WAV file.
    pub fn to_wav(&self) -> Vec<u8> {
        // `new` guarantees non-zero channels and rate.
        write_wav(&self.samples, self.channels, self.sample_rate, 16)
    }

    /// Samples scaled to `-1.0..1.0`, as audio output devices take them.
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| f32::from(s) / 32_768.0).collect()
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        let nanos = (self.frames() as u128) * 1_000_000_000 / u128::from(self.sample_rate.max(1));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/wav.rs"]
mod tests;
