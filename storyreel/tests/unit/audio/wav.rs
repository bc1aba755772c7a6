use super::*;

fn header_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn header_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[test]
fn wav_header_fields_are_consistent() {
    let samples = vec![0i16; 480];
    let wav = pcm_to_wav(&samples, 1, 24_000, 16).unwrap();

    assert_eq!(wav.len(), WAV_HEADER_LEN + samples.len() * 2);
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert_eq!(&wav[12..16], b"fmt ");
    assert_eq!(&wav[36..40], b"data");

    let data_len = header_u32(&wav, 40);
    assert_eq!(data_len as usize, samples.len() * 2);
    assert_eq!(header_u32(&wav, 4), 36 + data_len);
    assert_eq!(header_u16(&wav, 22), 1);
    assert_eq!(header_u32(&wav, 24), 24_000);
    assert_eq!(header_u32(&wav, 28), 24_000 * 2);
    assert_eq!(header_u16(&wav, 32), 2);
    assert_eq!(header_u16(&wav, 34), 16);
}

#[test]
fn wav_round_trips_through_a_standard_reader() {
    let samples: Vec<i16> = (0..2000)
        .map(|i| ((i as f32 * 0.05).sin() * 20_000.0) as i16)
        .chain([i16::MIN, i16::MAX, 0, -1])
        .collect();

    for (channels, rate) in [(1u16, 24_000u32), (2, 48_000)] {
        let wav = pcm_to_wav(&samples, channels, rate, 16).unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(&wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, channels);
        assert_eq!(spec.sample_rate, rate);
        assert_eq!(spec.bits_per_sample, 16);
        let back: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(back, samples);
    }
}

#[test]
fn eight_bit_output_is_offset_binary() {
    let wav = pcm_to_wav(&[0, i16::MIN, i16::MAX], 1, 8_000, 8).unwrap();
    assert_eq!(wav.len(), WAV_HEADER_LEN + 3);
    assert_eq!(&wav[WAV_HEADER_LEN..], &[128, 0, 255]);
    assert_eq!(header_u16(&wav, 32), 1);
}

#[test]
fn unsupported_bit_depths_are_rejected() {
    for bits in [0u16, 4, 12, 20, 33, 40, 64] {
        assert!(
            matches!(pcm_to_wav(&[1, 2], 1, 8_000, bits), Err(ReelError::Validation(_))),
            "{bits} bits"
        );
    }
    assert!(pcm_to_wav(&[1, 2], 0, 8_000, 16).is_err());

    let wav = pcm_to_wav(&[1, 2], 1, 8_000, 24).unwrap();
    assert_eq!(wav.len(), WAV_HEADER_LEN + 6);
    assert_eq!(header_u16(&wav, 34), 24);
    assert_eq!(&wav[WAV_HEADER_LEN..WAV_HEADER_LEN + 3], &[0, 1, 0]);
}

#[test]
fn malformed_base64_is_a_decode_error() {
    let err = decode_base64_to_bytes("not base64 !!").unwrap_err();
    assert!(matches!(err, ReelError::Decode(_)));
}

#[test]
fn odd_pcm_length_is_rejected() {
    assert!(matches!(
        pcm_s16le_to_samples(&[1, 2, 3]),
        Err(ReelError::Decode(_))
    ));
    assert_eq!(pcm_s16le_to_samples(&[1, 0, 0xff, 0xff]).unwrap(), vec![1, -1]);
}

#[test]
fn speech_from_base64_reports_duration() {
    let pcm: Vec<u8> = vec![0u8; SPEECH_SAMPLE_RATE as usize * 2 * 3 / 2];
    let b64 = base64::engine::general_purpose::STANDARD.encode(&pcm);
    let audio = SpeechAudio::from_base64_pcm(&b64, SPEECH_SAMPLE_RATE, 1).unwrap();
    assert_eq!(audio.frames(), SPEECH_SAMPLE_RATE as usize * 3 / 2);
    assert!((audio.duration_secs() - 1.5).abs() < 1e-9);

    let again = SpeechAudio::from_wav(&audio.to_wav()).unwrap();
    assert_eq!(again, audio);
}

#[test]
fn empty_speech_payload_is_rejected() {
    assert!(SpeechAudio::from_base64_pcm("", SPEECH_SAMPLE_RATE, 1).is_err());
}

#[test]
fn float_samples_span_unit_range() {
    let audio = SpeechAudio::new(vec![i16::MIN, 0, 16_384, i16::MAX], 24_000, 1).unwrap();
    let f = audio.to_f32();
    assert_eq!(f[..3], [-1.0, 0.0, 0.5]);
    assert!(f[3] < 1.0 && f[3] > 0.999);
}
