use std::sync::atomic::AtomicBool;

use super::*;
use crate::audio::wav::SpeechAudio;

#[derive(Default)]
struct Sizes(Mutex<Vec<(u32, u32)>>);

impl PreviewOutput for Sizes {
    fn present(&self, _cursor: PlaybackCursor, frame: &FrameRGBA) {
        self.0.lock().push((frame.width, frame.height));
    }

    fn play(&self, _audio: &SpeechAudio) {}
}

fn stage_with_sizes() -> (Stage, Arc<Sizes>) {
    let sizes = Arc::new(Sizes::default());
    let stage = Stage::new(Compositor::new(None), sizes.clone(), AspectRatio::Landscape);
    (stage, sizes)
}

#[test]
fn idle_redraw_is_skipped_between_begin_and_end_of_export() {
    let (stage, sizes) = stage_with_sizes();
    let shared = &stage.shared;
    let export = Canvas::new(216, 120).unwrap();

    shared.begin_export(export);
    assert_eq!(stage.target(), export);
    shared.redraw_unless_exporting();
    assert!(sizes.0.lock().is_empty());

    shared.end_export();
    shared.redraw_unless_exporting();
    let preview = stage.preview_target();
    assert_eq!(*sizes.0.lock(), vec![(preview.width, preview.height)]);
}

#[test]
fn idle_redraws_racing_export_start_stay_at_preview_size() {
    let (stage, sizes) = stage_with_sizes();
    let export = Canvas::new(216, 120).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let toggler = {
        let shared = Arc::clone(&stage.shared);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                shared.begin_export(export);
                std::thread::yield_now();
                shared.end_export();
            }
        })
    };
    for _ in 0..100 {
        stage.shared.redraw_unless_exporting();
    }
    done.store(true, Ordering::Release);
    toggler.join().unwrap();
    stage.shared.redraw_unless_exporting();

    let preview = stage.preview_target();
    let sizes = sizes.0.lock();
    assert!(!sizes.is_empty());
    assert!(
        sizes.iter().all(|&s| s == (preview.width, preview.height)),
        "{sizes:?}"
    );
}
