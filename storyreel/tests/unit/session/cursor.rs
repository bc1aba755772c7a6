use super::*;

#[test]
fn construction_is_range_checked() {
    assert_eq!(PlaybackCursor::line(0, 1).unwrap().index(), Some(0));
    assert_eq!(PlaybackCursor::line(4, 5).unwrap().index(), Some(4));
    assert!(PlaybackCursor::line(5, 5).is_err());
    assert!(PlaybackCursor::line(0, 0).is_err());
}

#[test]
fn idle_is_default_and_minus_one() {
    assert_eq!(PlaybackCursor::default(), PlaybackCursor::IDLE);
    assert!(PlaybackCursor::IDLE.is_idle());
    assert_eq!(PlaybackCursor::IDLE.as_signed(), -1);
    assert_eq!(PlaybackCursor::line(3, 4).unwrap().as_signed(), 3);
    assert_eq!(PlaybackCursor::IDLE.to_string(), "idle");
    assert_eq!(PlaybackCursor::line(2, 4).unwrap().to_string(), "line 2");
}
