use super::*;

#[test]
fn gender_parsing_is_whole_word_and_total() {
    assert_eq!(Gender::parse("Male"), Gender::Male);
    assert_eq!(Gender::parse(" girl "), Gender::Female);
    assert_eq!(Gender::parse("woman"), Gender::Female);
    // Substrings no longer leak ("female" contains "male").
    assert_eq!(Gender::parse("female"), Gender::Female);
    assert_eq!(Gender::parse("robot"), Gender::Unspecified);
    assert_eq!(Gender::parse(""), Gender::Unspecified);
}

#[test]
fn voice_mapping_is_deterministic() {
    assert_eq!(Gender::Male.voice(), VoiceId::Puck);
    assert_eq!(Gender::Female.voice(), VoiceId::Kore);
    assert_eq!(Gender::Unspecified.voice(), VoiceId::DEFAULT);
    assert_eq!(VoiceId::DEFAULT.as_str(), "Kore");
}

#[test]
fn request_validation() {
    let mut req = ProductionRequest::new("Visiting the Doctor", "a clinic", 2);
    req.validate().unwrap();

    req.cast = CastRequest::Generate(5);
    assert!(req.validate().is_err());
    req.cast = CastRequest::Generate(0);
    assert!(req.validate().is_err());
    req.cast = CastRequest::Explicit(vec![]);
    assert!(req.validate().is_err());

    req.cast = CastRequest::Explicit(vec![
        Character::new("Anna", Gender::Female, ""),
        Character::new(" anna ", Gender::Female, ""),
    ]);
    assert!(matches!(req.validate(), Err(ReelError::Validation(_))));
    req.cast = CastRequest::Explicit(vec![
        Character::new("Anna", Gender::Female, ""),
        Character::new("  ", Gender::Male, ""),
    ]);
    assert!(matches!(req.validate(), Err(ReelError::Validation(_))));
    req.cast = CastRequest::Explicit(vec![
        Character::new("Anna", Gender::Female, ""),
        Character::new("Ben", Gender::Male, ""),
    ]);
    req.validate().unwrap();

    let mut req = ProductionRequest::new("  ", "", 1);
    assert!(req.validate().is_err());
    req.topic = "x".into();
    req.duration_minutes = 0;
    assert!(req.validate().is_err());
}

#[test]
fn first_character_is_staged_left() {
    let prod = Production {
        characters: vec![
            Character::new("Anna", Gender::Female, ""),
            Character::new("Ben", Gender::Male, ""),
        ],
        lines: vec![DialogueLine::new("Anna", "Hi")],
        scene: SceneAsset {
            image: Arc::new(vec![]),
            prompt: String::new(),
        },
        aspect_ratio: AspectRatio::Landscape,
    };
    assert!(prod.speaker_on_left("anna"));
    assert!(!prod.speaker_on_left("Ben"));
    assert!(!prod.speaker_on_left("Narrator"));
    assert_eq!(prod.voiced_lines(), 0);
}
