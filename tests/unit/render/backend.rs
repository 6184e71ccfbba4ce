use super::*;

fn caps(encoder_reachable: bool) -> Capabilities {
    Capabilities {
        encoder_reachable,
        font: None,
    }
}

#[test]
fn auto_resolves_to_the_compositor() {
    assert_eq!(
        RendererBackend::resolve(BackendChoice::Auto, &caps(true)).unwrap(),
        RendererBackend::Compositor
    );
    assert_eq!(
        RendererBackend::resolve(BackendChoice::Auto, &caps(false)).unwrap(),
        RendererBackend::Compositor
    );
}

#[test]
fn filtergraph_requires_a_reachable_encoder() {
    assert_eq!(
        RendererBackend::resolve(BackendChoice::Filtergraph, &caps(true)).unwrap(),
        RendererBackend::Filtergraph
    );
    let err = RendererBackend::resolve(BackendChoice::Filtergraph, &caps(false)).unwrap_err();
    assert!(matches!(err, PulseError::EncoderSpawn(_)));
}

#[test]
fn backend_choice_uses_snake_case_names() {
    let choice: BackendChoice = serde_json::from_str("\"filtergraph\"").unwrap();
    assert_eq!(choice, BackendChoice::Filtergraph);
    assert_eq!(serde_json::to_string(&BackendChoice::Auto).unwrap(), "\"auto\"");
}

#[test]
fn detect_ignores_missing_programs_and_fonts() {
    let config = PipelineConfig {
        encoder_program: PathBuf::from("/nonexistent/pulsereel-encoder"),
        font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
        ..PipelineConfig::default()
    };
    let caps = Capabilities::detect(&config);
    assert!(!caps.encoder_reachable);
    assert!(caps.font.is_none());
}

#[test]
fn detect_keeps_a_readable_font() {
    let dir = tempfile::tempdir().unwrap();
    let font = dir.path().join("font.ttf");
    std::fs::write(&font, b"not really a font").unwrap();
    let config = PipelineConfig {
        encoder_program: PathBuf::from("/nonexistent/pulsereel-encoder"),
        font_path: Some(font.clone()),
        ..PipelineConfig::default()
    };
    assert_eq!(Capabilities::detect(&config).font, Some(font));
}
