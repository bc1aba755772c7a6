use super::*;

#[test]
fn empty_object_is_all_defaults() {
    let cfg = StudioConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, StudioConfig::default());
    assert_eq!(cfg.retry.max_attempts, 3);
    assert_eq!(cfg.backend.api_key_env, "STORYREEL_API_KEY");
    assert_eq!(cfg.store_root(), PathBuf::from("storyreel-projects"));
}

#[test]
fn partial_sections_merge_with_defaults() {
    let cfg = StudioConfig::from_json_str(
        r#"{
  "retry": { "max_attempts": 5 },
  "render": { "aspect_ratio": "9:16", "export_resolution": "2160" },
  "store_dir": "/tmp/reels"
}"#,
    )
    .unwrap();
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.rate_limit_base_ms, 5_000);
    assert_eq!(cfg.render.aspect_ratio, AspectRatio::Portrait);
    assert_eq!(cfg.render.export_resolution, ExportResolution::Uhd2160);
    assert_eq!(cfg.render.caption_color, "#ffffff");
    assert_eq!(cfg.store_root(), PathBuf::from("/tmp/reels"));
}

#[test]
fn malformed_json_is_a_serde_error() {
    assert!(matches!(
        StudioConfig::from_json_str("{ nope"),
        Err(ReelError::Serde(_))
    ));
}
