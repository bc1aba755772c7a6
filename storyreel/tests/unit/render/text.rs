use super::*;

pub(crate) fn system_font() -> Option<Arc<Vec<u8>>> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
    .map(Arc::new)
}

#[test]
fn approx_measure_is_linear() {
    let mut m = ApproxMeasure::default();
    let one = m.advance("abcd", 10.0).unwrap();
    let two = m.advance("abcdabcd", 10.0).unwrap();
    assert!((two - 2.0 * one).abs() < 1e-4);
    assert_eq!(m.advance("", 10.0).unwrap(), 0.0);
}

#[test]
fn invalid_font_fails_on_first_use_only() {
    let mut engine = TextLayoutEngine::new(Arc::new(b"not a font".to_vec()));
    assert_eq!(engine.advance("", 12.0).unwrap(), 0.0);
    assert!(engine.advance("hello", 12.0).is_err());
}

#[test]
fn rejects_bad_size() {
    let mut engine = TextLayoutEngine::new(Arc::new(Vec::new()));
    assert!(
        engine
            .layout_line("x", 0.0, TextBrushRgba8::default())
            .is_err()
    );
}

#[test]
fn shaped_width_grows_with_text() {
    let Some(font) = system_font() else {
        eprintln!("skipping: no DejaVuSans on this system");
        return;
    };
    let mut engine = TextLayoutEngine::new(font);
    let short = engine.advance("Hello", 40.0).unwrap();
    let long = engine.advance("Hello there", 40.0).unwrap();
    let bigger = engine.advance("Hello", 80.0).unwrap();
    assert!(short > 0.0);
    assert!(long > short);
    assert!((bigger / short - 2.0).abs() < 0.05);
}
