//! pulsereel turns audio tracks into short vertical videos with audio-reactive visuals and timed
//! captions.
//!
//! The public API is session-oriented:
//!
//! - Build a [`PipelineConfig`] (or load one from JSON)
//! - Create a [`RenderSession`], which detects capabilities and picks a [`RendererBackend`]
//! - Render [`RenderJob`]s to MP4, a single preview frame, or a whole batch directory
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod audio;
/// Batch metadata and the fault-isolated batch runner.
pub mod batch;
pub(crate) mod captions;
/// Pipeline configuration.
pub mod config;
/// Encoding sinks.
pub mod encode;
/// Frame rendering backends.
pub mod render;
/// Session-oriented rendering API.
pub mod session;
pub(crate) mod viz;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8, Rgba8Premul};
pub use crate::foundation::error::{PulseError, PulseResult};
pub use crate::foundation::math::{Fnv1a64, Rng64, fnv1a64};

pub use crate::animation::ease::Ease;
pub use crate::audio::decode::{ANALYSIS_SAMPLE_RATE, MonoPcm, decode_mono_f32};
pub use crate::audio::probe::{AudioAsset, AudioProbe, FfprobeProbe, FixedDurationProbe};
pub use crate::batch::{BatchOptions, BatchReport, JobOutcome, SongsMetadata, run_batch};
pub use crate::captions::script::{JobStyle, LyricLine, build_caption_script, parse_lyrics_cell};
pub use crate::captions::timeline::{ActiveCaption, CaptionEvent, CaptionLayer, CaptionTimeline};
pub use crate::config::{PipelineConfig, Preset, PresetName};
pub use crate::encode::ffmpeg::{BridgeOutcome, BridgeState, FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::render::backend::{
    BackendChoice, Capabilities, FrameRGBA, FrameRenderer, RendererBackend,
};
pub use crate::render::compositor::{Compositor, CompositorOptions, FrameInput};
pub use crate::render::filtergraph::{FiltergraphOptions, FiltergraphRenderer};
pub use crate::render::text::TextPainter;
pub use crate::session::{CancelToken, PreparedJob, RenderJob, RenderSession, RenderStats};
pub use crate::viz::spectrum::{
    PcmSpectrumEngine, SilentSpectrum, SpectrumSettings, SpectrumSource, VisualizationSample,
};
