use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::decode::{ANALYSIS_SAMPLE_RATE, decode_mono_f32};
use crate::audio::probe::{AudioAsset, AudioProbe, FfprobeProbe};
use crate::captions::timeline::CaptionTimeline;
use crate::config::{PipelineConfig, Preset, PresetName};
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::backend::{Capabilities, FrameRGBA, FrameRenderer, RendererBackend};
use crate::render::compositor::{Compositor, CompositorOptions, FrameInput};
use crate::render::filtergraph::FiltergraphRenderer;
use crate::render::text::TextPainter;
use crate::viz::spectrum::{
    PcmSpectrumEngine, SilentSpectrum, SpectrumSettings, SpectrumSource, VisualizationSample,
};

/// Shared cancellation flag, checked before every frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One video to produce.
#[derive(Clone, Debug)]
pub struct RenderJob {
    /// Input audio file.
    pub audio: PathBuf,
    /// Captions drawn over the visuals.
    pub captions: CaptionTimeline,
    /// Output MP4 path.
    pub output: PathBuf,
    /// Preset override; the session config's preset otherwise.
    pub preset: Option<PresetName>,
    /// Background colour override.
    pub background: Option<Rgba8>,
    /// `audio` already probed; [`RenderSession::prepare`] probes it otherwise.
    pub asset: Option<AudioAsset>,
}

impl RenderJob {
    /// Job with no captions and no overrides.
    pub fn new(audio: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            audio: audio.into(),
            captions: CaptionTimeline::empty(),
            output: output.into(),
            preset: None,
            background: None,
            asset: None,
        }
    }

    /// Replace the caption timeline.
    pub fn with_captions(mut self, captions: CaptionTimeline) -> Self {
        self.captions = captions;
        self
    }
}

/// A job after probing, with every setting resolved.
#[derive(Clone, Debug)]
pub struct PreparedJob {
    /// Probed audio.
    pub asset: AudioAsset,
    /// Captions.
    pub captions: CaptionTimeline,
    /// Output MP4 path.
    pub output: PathBuf,
    /// Output frame rate.
    pub fps: Fps,
    /// Output canvas.
    pub canvas: Canvas,
    /// Resolved preset (background override applied).
    pub preset: Preset,
    /// `max(1, floor(duration * fps))`.
    pub total_frames: u64,
}

impl PreparedJob {
    /// Video length in seconds (at least one frame).
    pub fn video_duration_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.total_frames)
    }
}

/// Outcome of a finished job.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderStats {
    /// Renderer that produced the output.
    pub backend: RendererBackend,
    /// Frames delivered to the encoder.
    pub frames: u64,
    /// Probed audio duration.
    pub duration_secs: f64,
    /// Output path.
    pub output: PathBuf,
}

/// Long-lived render context: configuration, detected capabilities and the loaded font.
///
/// Backend selection happens once here; jobs rendered through the session never re-probe the
/// environment.
pub struct RenderSession {
    config: PipelineConfig,
    fps: Fps,
    caps: Capabilities,
    backend: RendererBackend,
    probe: Box<dyn AudioProbe>,
    font_bytes: Option<Vec<u8>>,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("font_loaded", &self.font_bytes.is_some())
            .finish()
    }
}

impl RenderSession {
    /// Validate `config`, detect capabilities and resolve the backend.
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn new(config: PipelineConfig) -> PulseResult<Self> {
        config.validate()?;
        let fps = config.frame_rate()?;
        let caps = Capabilities::detect(&config);
        let backend = RendererBackend::resolve(config.backend, &caps)?;

        let font_bytes = caps.font.as_ref().and_then(|p| match std::fs::read(p) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "failed to read font");
                None
            }
        });

        tracing::debug!(?backend, encoder = caps.encoder_reachable, "render session ready");
        Ok(Self {
            probe: Box::new(FfprobeProbe::new(config.probe_program.clone())),
            config,
            fps,
            caps,
            backend,
            font_bytes,
        })
    }

    /// Replace the audio probe.
    pub fn with_probe(mut self, probe: Box<dyn AudioProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Session configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Backend chosen at construction.
    pub fn backend(&self) -> RendererBackend {
        self.backend
    }

    /// Capabilities detected at construction.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Probe `path` with the session's audio probe.
    pub fn probe(&self, path: &Path) -> PulseResult<AudioAsset> {
        self.probe.probe(path)
    }

    /// Probe the audio (unless the job carries a matching asset) and resolve the job against the
    /// session config.
    pub fn prepare(&self, job: &RenderJob) -> PulseResult<PreparedJob> {
        let asset = match &job.asset {
            Some(asset) if asset.path == job.audio => asset.clone(),
            _ => self.probe.probe(&job.audio)?,
        };
        let mut preset = job.preset.unwrap_or(self.config.preset).preset();
        if let Some(bg) = job.background.or(self.config.background) {
            preset.background = bg;
        }
        Ok(PreparedJob {
            total_frames: self.fps.total_frames_for(asset.duration_secs),
            asset,
            captions: job.captions.clone(),
            output: job.output.clone(),
            fps: self.fps,
            canvas: self.config.canvas(),
            preset,
        })
    }

    /// Build a compositor for `job`, with the session font if one loaded.
    pub fn compositor_for(&self, job: &PreparedJob) -> PulseResult<Compositor> {
        let text = self
            .font_bytes
            .as_ref()
            .and_then(|bytes| match TextPainter::from_font_bytes(bytes.clone()) {
                Ok(painter) => Some(painter),
                Err(e) => {
                    tracing::warn!(error = %e, "font unusable; text layers will be skipped");
                    None
                }
            });
        Compositor::new(job.canvas, job.preset, self.compositor_options(), text)
    }

    fn compositor_options(&self) -> CompositorOptions {
        CompositorOptions {
            seed: self.config.seed,
            logo_text: self.config.logo_text.clone(),
            watermark_text: self.config.watermark_text.clone(),
            logo_pulse_amplitude: self.config.logo_pulse_amplitude,
            logo_pulse_hz: self.config.logo_pulse_hz,
        }
    }

    /// Spectrum source for `path`, falling back to silence when the audio cannot be decoded.
    pub fn spectrum_for(&self, path: &Path) -> PulseResult<Box<dyn SpectrumSource>> {
        let settings = SpectrumSettings {
            bands: self.config.bands,
            smoothing: self.config.smoothing as f32,
            ..SpectrumSettings::default()
        };
        match decode_mono_f32(&self.config.encoder_program, path, ANALYSIS_SAMPLE_RATE) {
            Ok(pcm) => Ok(Box::new(PcmSpectrumEngine::new(Arc::new(pcm), settings)?)),
            Err(e @ PulseError::VisualizationUnavailable(_)) => {
                tracing::warn!(error = %e, "visualization unavailable; rendering silent bars");
                Ok(Box::new(SilentSpectrum::new(self.config.bands)))
            }
            Err(e) => Err(e),
        }
    }

    /// Render `job` to its output file with the session's backend.
    #[tracing::instrument(skip(self, job, cancel), fields(audio = %job.audio.display()))]
    pub fn render(&self, job: &RenderJob, cancel: &CancelToken) -> PulseResult<RenderStats> {
        let prepared = self.prepare(job)?;
        tracing::info!(
            output = %prepared.output.display(),
            duration_secs = prepared.asset.duration_secs,
            frames = prepared.total_frames,
            backend = ?self.backend,
            "render started"
        );
        let mut renderer: Box<dyn FrameRenderer + '_> = match self.backend {
            RendererBackend::Compositor => Box::new(StreamingRenderer { session: self }),
            RendererBackend::Filtergraph => Box::new(FiltergraphRenderer::new(&self.config)),
        };
        let stats = renderer.render_job(&prepared, cancel)?;
        tracing::info!(output = %stats.output.display(), frames = stats.frames, "render finished");
        Ok(stats)
    }

    /// Render `job` through the compositor into a caller-supplied spectrum source and sink.
    #[tracing::instrument(skip_all, fields(audio = %job.audio.display()))]
    pub fn render_with(
        &self,
        job: &RenderJob,
        spectrum: &mut dyn SpectrumSource,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> PulseResult<RenderStats> {
        let prepared = self.prepare(job)?;
        let mut compositor = self.compositor_for(&prepared)?;
        run_frame_loop(&prepared, &mut compositor, spectrum, sink, cancel)
    }

    /// Render the single frame at `t_secs` without encoding.
    #[tracing::instrument(skip(self, job), fields(audio = %job.audio.display()))]
    pub fn preview_frame(&self, job: &RenderJob, t_secs: f64) -> PulseResult<FrameRGBA> {
        if !t_secs.is_finite() || t_secs < 0.0 {
            return Err(PulseError::validation("preview time must be finite and >= 0"));
        }
        let prepared = self.prepare(job)?;
        let mut spectrum = self.spectrum_for(&prepared.asset.path)?;
        let mut compositor = self.compositor_for(&prepared)?;
        let mut frame = compositor.new_frame();
        render_frame_at(
            &prepared,
            &mut compositor,
            spectrum.as_mut(),
            t_secs,
            &mut frame,
            &mut false,
        )?;
        Ok(frame)
    }
}

/// Per-frame compositor renderer that streams to the encoder bridge.
struct StreamingRenderer<'s> {
    session: &'s RenderSession,
}

impl FrameRenderer for StreamingRenderer<'_> {
    fn backend(&self) -> RendererBackend {
        RendererBackend::Compositor
    }

    fn render_job(&mut self, job: &PreparedJob, cancel: &CancelToken) -> PulseResult<RenderStats> {
        let mut spectrum = self.session.spectrum_for(&job.asset.path)?;
        let mut compositor = self.session.compositor_for(job)?;
        let bg = job.preset.background;
        let mut sink = FfmpegSink::new(FfmpegSinkOpts {
            program: self.session.config.encoder_program.clone(),
            out_path: job.output.clone(),
            bg_rgba: [bg.r, bg.g, bg.b, 255],
        });
        run_frame_loop(job, &mut compositor, spectrum.as_mut(), &mut sink, cancel)
    }
}

/// Drive `total_frames` frames through the compositor into `sink`.
///
/// Frames are produced one at a time into a reused buffer; a sink that blocks in `push_frame`
/// holds the loop at the current frame. Cancellation aborts the sink before the next frame.
pub fn run_frame_loop(
    job: &PreparedJob,
    compositor: &mut Compositor,
    spectrum: &mut dyn SpectrumSource,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
) -> PulseResult<RenderStats> {
    sink.begin(SinkConfig {
        width: job.canvas.width,
        height: job.canvas.height,
        fps: job.fps,
        audio: Some(job.asset.path.clone()),
    })?;

    let mut frame = compositor.new_frame();
    let mut sample_warned = false;
    let progress_every = (job.fps.as_f64().round() as u64).max(1);

    for i in 0..job.total_frames {
        if cancel.is_cancelled() {
            sink.abort();
            tracing::info!(frame = i, total = job.total_frames, "render cancelled");
            return Err(PulseError::Cancelled);
        }

        let t = job.fps.frame_time_secs(FrameIndex(i));
        if let Err(e) = render_frame_at(job, compositor, spectrum, t, &mut frame, &mut sample_warned)
        {
            sink.abort();
            return Err(e);
        }

        if let Err(push_err) = sink.push_frame(FrameIndex(i), &frame) {
            return Err(match sink.end() {
                Err(end_err) => end_err,
                Ok(()) => push_err,
            });
        }

        if (i + 1).is_multiple_of(progress_every) {
            tracing::debug!(frame = i + 1, total = job.total_frames, "render progress");
        }
    }

    sink.end()?;
    Ok(RenderStats {
        backend: RendererBackend::Compositor,
        frames: job.total_frames,
        duration_secs: job.asset.duration_secs,
        output: job.output.clone(),
    })
}

fn render_frame_at(
    job: &PreparedJob,
    compositor: &mut Compositor,
    spectrum: &mut dyn SpectrumSource,
    t: f64,
    frame: &mut FrameRGBA,
    sample_warned: &mut bool,
) -> PulseResult<()> {
    spectrum.set_time(t);
    let sample = match spectrum.sample(t) {
        Ok(sample) => sample,
        Err(e) => {
            if !*sample_warned {
                tracing::warn!(t, error = %e, "spectrum sample failed; using silence");
                *sample_warned = true;
            }
            VisualizationSample::zeros(spectrum.bands())
        }
    };
    let captions = job.captions.active_at(t);
    compositor.render(
        frame,
        &FrameInput {
            beat_strength: sample.beat_strength(),
            sample: &sample,
            elapsed_secs: t,
            captions: &captions,
        },
    )
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
