use super::*;
use crate::audio::wav::{SPEECH_SAMPLE_RATE, SpeechAudio};

fn voiced(ms: u64) -> DialogueLine {
    let frames = (SPEECH_SAMPLE_RATE as u64 * ms / 1000) as usize;
    let mut line = DialogueLine::new("A", "x");
    line.audio = Some(SpeechAudio::new(vec![0; frames], SPEECH_SAMPLE_RATE, 1).unwrap());
    line
}

fn silent() -> DialogueLine {
    DialogueLine::new("B", "y")
}

#[test]
fn hold_is_speech_plus_tail_or_fixed() {
    assert_eq!(hold_for(&voiced(1200)), Duration::from_millis(1700));
    assert_eq!(hold_for(&silent()), Duration::from_millis(3000));
}

#[test]
fn schedule_accumulates_holds() {
    let tl = Timeline::from_lines(&[voiced(1000), silent(), voiced(500)]);
    assert_eq!(tl.len(), 3);
    assert_eq!(tl.start(0), Some(Duration::ZERO));
    assert_eq!(tl.start(1), Some(Duration::from_millis(1500)));
    assert_eq!(tl.start(2), Some(Duration::from_millis(4500)));
    assert_eq!(tl.total(), Duration::from_millis(5500));
    assert_eq!(tl.hold(3), None);
}

#[test]
fn line_at_maps_time_to_cursor() {
    let tl = Timeline::from_lines(&[voiced(1000), silent()]);
    let at = |ms| tl.line_at(Duration::from_millis(ms)).index();
    assert_eq!(at(0), Some(0));
    assert_eq!(at(1499), Some(0));
    assert_eq!(at(1500), Some(1));
    assert_eq!(at(4499), Some(1));
    assert_eq!(at(4500), None);
    assert_eq!(at(99_999), None);
}

#[test]
fn frame_count_rounds_up() {
    let tl = Timeline::from_lines(&[silent()]);
    assert_eq!(tl.frame_count(Fps::CAPTURE), 90);
    let tl = Timeline::from_lines(&[voiced(10)]);
    // 510 ms at 30 fps = 15.3 frames.
    assert_eq!(tl.frame_count(Fps::CAPTURE), 16);
    assert!(Timeline::default().is_empty());
    assert_eq!(Timeline::default().line_at(Duration::ZERO), PlaybackCursor::IDLE);
}
