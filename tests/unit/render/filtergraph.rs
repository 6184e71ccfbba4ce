use super::*;

use crate::audio::probe::AudioAsset;
use crate::config::PresetName;
use crate::foundation::core::{Canvas, Fps};

fn job(captions: Vec<CaptionEvent>) -> PreparedJob {
    let fps = Fps::whole(30).unwrap();
    PreparedJob {
        asset: AudioAsset {
            path: PathBuf::from("songs/track.mp3"),
            duration_secs: 12.0,
        },
        captions: crate::captions::timeline::CaptionTimeline::new(captions).unwrap(),
        output: PathBuf::from("out/track.mp4"),
        fps,
        canvas: Canvas {
            width: 1080,
            height: 1920,
        },
        preset: PresetName::Neon.preset(),
        total_frames: fps.total_frames_for(12.0),
    }
}

fn opts() -> FiltergraphOptions {
    FiltergraphOptions::from_config(&PipelineConfig::default())
}

#[test]
fn escape_text_quotes_and_neutralizes_separators() {
    assert_eq!(escape_text("plain"), "'plain'");
    assert_eq!(escape_text("he's"), "'he\u{2019}s'");
    assert_eq!(escape_text("a:b"), "'a\\:b'");
    assert_eq!(escape_text("back\\slash"), "'back\\\\slash'");
    assert_eq!(escape_text("two\nlines"), "'two lines'");
}

#[test]
fn script_chains_every_caption_into_final() {
    let captions = vec![
        CaptionEvent::new(0.0, 3.3, "HOOK").with_layer(CaptionLayer::Hook),
        CaptionEvent::new(4.0, 9.0, "line one").with_layer(CaptionLayer::Lyric),
        CaptionEvent::new(5.0, 12.0, "Tag your toxic ex").with_layer(CaptionLayer::Caption),
    ];
    let script = build_filter_script(&job(captions), &opts());

    assert!(script.starts_with("color=c=0x0F0019:s=1080x1920:r=30:d=12.000[bg];"));
    assert!(script.contains("showspectrum="));
    assert!(script.contains("enable='between(t,0.000,3.300)'"));
    assert!(script.contains("enable='between(t,4.000,9.000)'"));
    assert!(script.contains("text='Tag your toxic ex'"));
    assert!(script.contains(":box=1:"));
    assert!(script.ends_with("format=yuv420p[final]"));
    assert_eq!(script.matches("drawtext=").count(), 5);
}

#[test]
fn empty_branding_is_omitted() {
    let mut o = opts();
    o.logo_text = String::new();
    o.watermark_text = None;
    let script = build_filter_script(&job(Vec::new()), &o);
    assert!(!script.contains("drawtext="));
    assert!(script.contains("[bg2]drawbox="));
}

#[test]
fn font_file_is_passed_when_configured() {
    let mut o = opts();
    o.font = Some(PathBuf::from("C:/Fonts/impact.ttf"));
    let script = build_filter_script(&job(Vec::new()), &o);
    assert!(script.contains("drawtext=fontfile='C\\:/Fonts/impact.ttf':text="));
}

#[test]
fn args_map_the_filter_output_and_source_audio() {
    let j = job(Vec::new());
    let args: Vec<String> = filtergraph_args(&j, Path::new("out/track.filtergraph.txt"))
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[final]"));
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a"));
    assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "12.000"));
    assert_eq!(args.last().map(String::as_str), Some("out/track.mp4"));
}

#[test]
fn missing_encoder_is_a_spawn_error_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut j = job(Vec::new());
    j.output = dir.path().join("track.mp4");
    let config = PipelineConfig {
        encoder_program: dir.path().join("no-encoder"),
        ..PipelineConfig::default()
    };
    let err = FiltergraphRenderer::new(&config)
        .render_job(&j, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PulseError::EncoderSpawn(_)));
    assert!(!dir.path().join("track.filtergraph.txt").exists());
}

#[test]
fn cancelled_before_start_does_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = FiltergraphRenderer::new(&PipelineConfig::default())
        .render_job(&job(Vec::new()), &cancel)
        .unwrap_err();
    assert!(matches!(err, PulseError::Cancelled));
}
