use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::PulseResult;
use crate::render::backend::FrameRGBA;
use std::path::PathBuf;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Original audio file muxed against the video, if any.
    pub audio: Option<PathBuf>,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order. A push
/// blocks until the sink has accepted the frame; frames are never dropped.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()>;
    /// Called once after the last frame is pushed; reports the final outcome.
    fn end(&mut self) -> PulseResult<()>;
    /// Stop early and release resources. Called instead of `end` on cancellation.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Whether `end` was called.
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Whether `abort` was called.
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> PulseResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
