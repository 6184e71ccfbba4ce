use super::*;

use crate::audio::probe::FixedDurationProbe;
use crate::captions::timeline::CaptionEvent;
use crate::encode::sink::InMemorySink;

fn small_config() -> PipelineConfig {
    PipelineConfig {
        width: 108,
        height: 192,
        fps: 10,
        bands: 32,
        encoder_program: PathBuf::from("/nonexistent/pulsereel-encoder"),
        probe_program: PathBuf::from("/nonexistent/pulsereel-probe"),
        ..PipelineConfig::default()
    }
}

fn session(duration: f64) -> RenderSession {
    RenderSession::new(small_config())
        .unwrap()
        .with_probe(Box::new(FixedDurationProbe::new(duration)))
}

fn audio_file(dir: &Path) -> PathBuf {
    let p = dir.join("track.mp3");
    std::fs::write(&p, b"ID3").unwrap();
    p
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let a = CancelToken::new();
    let b = a.clone();
    assert!(!b.is_cancelled());
    a.cancel();
    assert!(b.is_cancelled());
}

#[test]
fn new_rejects_invalid_config() {
    let cfg = PipelineConfig {
        width: 107,
        ..small_config()
    };
    assert!(matches!(
        RenderSession::new(cfg),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn prepare_resolves_overrides_and_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(2.55);
    let mut job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    job.preset = Some(PresetName::Glowup);
    job.background = Some(Rgba8::rgb(1, 2, 3));

    let prepared = s.prepare(&job).unwrap();
    assert_eq!(prepared.total_frames, 25);
    assert_eq!(prepared.preset.name, PresetName::Glowup);
    assert_eq!(prepared.preset.background, Rgba8::rgb(1, 2, 3));
    assert_eq!(prepared.canvas.width, 108);
}

#[test]
fn prepare_reports_missing_audio() {
    let s = session(1.0);
    let job = RenderJob::new("/nonexistent/track.mp3", "out.mp4");
    assert!(matches!(s.prepare(&job), Err(PulseError::AudioNotFound(_))));
}

#[test]
fn render_with_streams_every_frame_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(1.0);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    let mut sink = InMemorySink::new();
    let stats = s
        .render_with(
            &job,
            &mut SilentSpectrum::new(32),
            &mut sink,
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(stats.frames, 10);
    assert_eq!(stats.backend, RendererBackend::Compositor);
    assert!(sink.ended());
    let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, (0..10).collect::<Vec<_>>());
    let cfg = sink.config().unwrap();
    assert_eq!((cfg.width, cfg.height), (108, 192));
    assert_eq!(cfg.audio.as_deref(), Some(job.audio.as_path()));
}

#[test]
fn zero_duration_still_renders_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(0.0);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    let mut sink = InMemorySink::new();
    s.render_with(
        &job,
        &mut SilentSpectrum::new(32),
        &mut sink,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(sink.frames().len(), 1);
}

struct FailingSpectrum;

impl SpectrumSource for FailingSpectrum {
    fn bands(&self) -> usize {
        8
    }

    fn sample(&mut self, _t_secs: f64) -> PulseResult<VisualizationSample> {
        Err(PulseError::visualization("decoder not ready"))
    }
}

#[test]
fn failing_spectrum_degrades_to_silence() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(0.5);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));

    let mut failing = InMemorySink::new();
    s.render_with(&job, &mut FailingSpectrum, &mut failing, &CancelToken::new())
        .unwrap();
    let mut silent = InMemorySink::new();
    s.render_with(
        &job,
        &mut SilentSpectrum::new(8),
        &mut silent,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(failing.frames().len(), 5);
    for ((_, a), (_, b)) in failing.frames().iter().zip(silent.frames()) {
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn pre_cancelled_render_aborts_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(1.0);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut sink = InMemorySink::new();
    let err = s
        .render_with(&job, &mut SilentSpectrum::new(8), &mut sink, &cancel)
        .unwrap_err();
    assert!(matches!(err, PulseError::Cancelled));
    assert!(sink.aborted());
    assert!(!sink.ended());
    assert!(sink.frames().is_empty());
}

#[test]
fn captions_without_a_font_leave_frames_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(1.0);
    let audio = audio_file(dir.path());
    let plain = RenderJob::new(&audio, dir.path().join("a.mp4"));
    let captioned = RenderJob::new(&audio, dir.path().join("b.mp4")).with_captions(
        CaptionTimeline::new(vec![CaptionEvent::new(0.2, 0.4, "HI")]).unwrap(),
    );

    let mut a = InMemorySink::new();
    let mut b = InMemorySink::new();
    s.render_with(&plain, &mut SilentSpectrum::new(8), &mut a, &CancelToken::new())
        .unwrap();
    s.render_with(&captioned, &mut SilentSpectrum::new(8), &mut b, &CancelToken::new())
        .unwrap();

    assert_eq!(a.frames()[9].1.data, b.frames()[9].1.data);
    assert_eq!(a.frames()[0].1.data, b.frames()[0].1.data);
}

#[test]
fn preview_rejects_negative_time() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(1.0);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    assert!(s.preview_frame(&job, -1.0).is_err());
}

#[test]
fn preview_falls_back_to_silence_without_a_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let s = session(1.0);
    let job = RenderJob::new(audio_file(dir.path()), dir.path().join("out.mp4"));
    let frame = s.preview_frame(&job, 0.5).unwrap();
    assert_eq!((frame.width, frame.height), (108, 192));
    assert_eq!(frame.data.len(), 108 * 192 * 4);
}
