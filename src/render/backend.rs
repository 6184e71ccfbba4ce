use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::foundation::error::{PulseError, PulseResult};
use crate::session::{CancelToken, PreparedJob, RenderStats};

/// A rendered frame as RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// Renderer requested by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Pick from detected capabilities.
    #[default]
    Auto,
    /// Force the per-frame compositor.
    Compositor,
    /// Force the whole-job encoder filtergraph.
    Filtergraph,
}

/// Concrete renderer implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererBackend {
    /// Frames are rasterized in-process and streamed to the encoder.
    Compositor,
    /// The encoder draws the video itself from a generated filtergraph.
    Filtergraph,
}

/// What the host environment supports, detected once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The encoder executable answered `-version`.
    pub encoder_reachable: bool,
    /// Configured font, if it exists and is readable.
    pub font: Option<PathBuf>,
}

impl Capabilities {
    /// Probe the encoder and font named by `config`.
    pub fn detect(config: &PipelineConfig) -> Self {
        let font = config
            .font_path
            .as_ref()
            .filter(|p| std::fs::File::open(p).is_ok())
            .cloned();
        Self {
            encoder_reachable: program_responds(&config.encoder_program),
            font,
        }
    }
}

impl RendererBackend {
    /// Choose a renderer for `choice` given detected `caps`.
    ///
    /// `Auto` always lands on the compositor: it needs no font (text layers degrade) and only
    /// needs the encoder for the final mux. The filtergraph backend is only usable when the
    /// encoder is reachable.
    pub fn resolve(choice: BackendChoice, caps: &Capabilities) -> PulseResult<Self> {
        let backend = match choice {
            BackendChoice::Auto | BackendChoice::Compositor => Self::Compositor,
            BackendChoice::Filtergraph => {
                if !caps.encoder_reachable {
                    return Err(PulseError::encoder_spawn(
                        "filtergraph backend requires a reachable encoder",
                    ));
                }
                Self::Filtergraph
            }
        };
        if backend == Self::Compositor && caps.font.is_none() {
            tracing::warn!("no readable font configured; text layers will be skipped");
        }
        if !caps.encoder_reachable {
            tracing::warn!("encoder not reachable; only frame previews will succeed");
        }
        Ok(backend)
    }
}

/// Turns one prepared job into an encoded output file.
///
/// Implementations are selected once per session by [`RendererBackend::resolve`].
pub trait FrameRenderer {
    /// Which implementation this is.
    fn backend(&self) -> RendererBackend;

    /// Render `job` to its output path, checking `cancel` between units of work.
    fn render_job(&mut self, job: &PreparedJob, cancel: &CancelToken) -> PulseResult<RenderStats>;
}

/// Return `true` when `program -version` runs successfully.
pub fn program_responds(program: &Path) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/render/backend.rs"]
mod tests;
