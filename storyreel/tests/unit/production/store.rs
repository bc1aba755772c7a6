use super::*;
use crate::audio::wav::SPEECH_SAMPLE_RATE;
use crate::production::model::Gender;

fn sample_project() -> Project {
    let mut voiced = DialogueLine::new("Anna", "Hello there.");
    voiced.audio =
        Some(SpeechAudio::new(vec![0, 1000, -1000, 32767], SPEECH_SAMPLE_RATE, 1).unwrap());
    Project {
        id: ProjectId::new(),
        created_at: chrono::Utc::now(),
        request: ProductionRequest::new("Visiting the Doctor", "a clinic", 2),
        production: Production {
            characters: vec![
                Character::new("Anna", Gender::Female, "doctor in a white coat"),
                Character::new("Ben", Gender::Male, "nervous patient"),
            ],
            lines: vec![voiced, DialogueLine::new("Ben", "Hi doctor.")],
            scene: SceneAsset {
                image: Arc::new(vec![1, 2, 3, 4]),
                prompt: "clinic".to_owned(),
            },
            aspect_ratio: AspectRatio::Portrait,
        },
        overlay: OverlayConfig {
            text: "Lesson 4".to_owned(),
            text_color: Rgba8::rgb(255, 200, 0),
            logo: Some(Arc::new(b"<svg/>".to_vec())),
        },
    }
}

fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "storyreel_store_{tag}_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4()
    ))
}

#[test]
fn project_id_parses_its_display_form() {
    let id = ProjectId::new();
    assert_eq!(ProjectId::parse(&id.to_string()).unwrap(), id);
    assert!(ProjectId::parse("not-a-uuid").is_err());
}

#[test]
fn memory_store_saves_and_lists() {
    let store = MemoryProjectStore::new();
    let p = sample_project();
    let id = store.save(&p).unwrap();
    assert_eq!(store.load(&id).unwrap(), p);
    let list = store.list().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].topic, "Visiting the Doctor");
    assert_eq!((list[0].lines, list[0].voiced_lines), (2, 1));
    assert!(matches!(
        store.load(&ProjectId::new()),
        Err(ReelError::Store(_))
    ));
}

#[test]
fn dir_store_round_trips_production() {
    let root = temp_root("roundtrip");
    let store = DirProjectStore::new(&root);
    assert!(store.list().unwrap().is_empty());

    let p = sample_project();
    let id = store.save(&p).unwrap();
    let dir = root.join(id.to_string());
    for f in ["project.json", "scene.bin", "logo.bin", "line_000.wav"] {
        assert!(dir.join(f).is_file(), "missing {f}");
    }
    assert!(!dir.join("line_001.wav").exists());

    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded.production, p.production);
    assert_eq!(loaded.overlay, p.overlay);
    assert_eq!(loaded.request, p.request);
    assert_eq!(loaded.created_at, p.created_at);

    // Saving again replaces in place.
    let mut changed = p.clone();
    changed.overlay.logo = None;
    store.save(&changed).unwrap();
    assert!(!dir.join("logo.bin").exists());
    assert_eq!(store.list().unwrap().len(), 1);

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn dir_store_lists_newest_first_and_skips_garbage() {
    let root = temp_root("list");
    let store = DirProjectStore::new(&root);
    let mut older = sample_project();
    older.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
    older.request.topic = "older".to_owned();
    let newer = sample_project();
    store.save(&older).unwrap();
    store.save(&newer).unwrap();

    let junk = root.join("junk");
    std::fs::create_dir_all(&junk).unwrap();
    std::fs::write(junk.join("project.json"), "{ nope").unwrap();

    let list = store.list().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, newer.id);
    assert_eq!(list[1].topic, "older");

    assert!(matches!(
        store.load(&ProjectId::new()),
        Err(ReelError::Store(_))
    ));
    std::fs::remove_dir_all(&root).unwrap();
}
