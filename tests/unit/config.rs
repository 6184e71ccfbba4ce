use super::*;

#[test]
fn default_config_is_valid_vertical() {
    let cfg = PipelineConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.canvas().width, 1080);
    assert_eq!(cfg.canvas().height, 1920);
    assert_eq!(cfg.frame_rate().unwrap().as_f64(), 30.0);
    assert_eq!(cfg.bands, 256);
}

#[test]
fn partial_json_keeps_defaults() {
    let cfg = PipelineConfig::from_json_str(r#"{"width": 1080, "height": 1080, "preset": "glowup"}"#)
        .unwrap();
    assert_eq!(cfg.height, 1080);
    assert_eq!(cfg.preset, PresetName::Glowup);
    assert_eq!(cfg.fps, 30);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = PipelineConfig::from_json_str(r#"{"widht": 10}"#).unwrap_err();
    assert!(matches!(err, PulseError::Serde(_)));
}

#[test]
fn odd_dimensions_and_zero_fps_fail_validation() {
    let cfg = PipelineConfig {
        width: 1081,
        ..PipelineConfig::default()
    };
    assert!(cfg.validate().is_err());
    let cfg = PipelineConfig {
        fps: 0,
        ..PipelineConfig::default()
    };
    assert!(cfg.validate().is_err());
    let cfg = PipelineConfig {
        bands: 0,
        ..PipelineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn preset_follows_file_name_and_background_override() {
    assert_eq!(PresetName::for_file_name("GlowUp_01.mp3"), PresetName::Glowup);
    assert_eq!(PresetName::for_file_name("toxic.mp3"), PresetName::Neon);

    let cfg = PipelineConfig {
        background: Some(Rgba8::rgb(4, 0, 10)),
        ..PipelineConfig::default()
    };
    assert_eq!(cfg.resolved_preset().background, Rgba8::rgb(4, 0, 10));
    assert_eq!("NEON".parse::<PresetName>().unwrap(), PresetName::Neon);
    assert!("disco".parse::<PresetName>().is_err());
}
