use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::backend::BackendChoice;

/// Explicit pipeline configuration handed to a [`crate::RenderSession`].
///
/// Every field has a default, so a JSON config file only needs the keys it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Output width in pixels (must be even).
    pub width: u32,
    /// Output height in pixels (must be even).
    pub height: u32,
    /// Whole frames per second.
    pub fps: u32,
    /// Visual preset.
    pub preset: PresetName,
    /// Seed for the starfield and any other procedural detail.
    pub seed: u64,
    /// Number of spectrum bands (radial bars).
    pub bands: usize,
    /// Geometric weight applied to preceding analysis windows, in `[0, 1)`.
    pub smoothing: f64,
    /// Encoder executable.
    pub encoder_program: PathBuf,
    /// Audio inspector executable.
    pub probe_program: PathBuf,
    /// Font used for logo, watermark and captions. Text layers are skipped when absent.
    pub font_path: Option<PathBuf>,
    /// Pulsing centre logo text.
    pub logo_text: String,
    /// Corner watermark text.
    pub watermark_text: Option<String>,
    /// Logo pulse amplitude.
    pub logo_pulse_amplitude: f64,
    /// Logo pulse frequency in Hz.
    pub logo_pulse_hz: f64,
    /// Overrides the preset's background centre colour.
    pub background: Option<Rgba8>,
    /// Renderer selection.
    pub backend: BackendChoice,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            preset: PresetName::Neon,
            seed: 0x5EED_F00D,
            bands: 256,
            smoothing: 0.7,
            encoder_program: PathBuf::from("ffmpeg"),
            probe_program: PathBuf::from("ffprobe"),
            font_path: None,
            logo_text: "exroast.buzz".to_owned(),
            watermark_text: Some("exroast.buzz".to_owned()),
            logo_pulse_amplitude: 0.12,
            logo_pulse_hz: 1.0,
            background: None,
            backend: BackendChoice::Auto,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON config string.
    pub fn from_json_str(s: &str) -> PulseResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| PulseError::serde(format!("failed to parse pipeline config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: &Path) -> PulseResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check invariants the render loop relies on.
    pub fn validate(&self) -> PulseResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PulseError::validation("width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(PulseError::validation(
                "width/height must be even (required for yuv420p output)",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(PulseError::validation("width/height must fit in u16"));
        }
        if self.fps == 0 {
            return Err(PulseError::validation("fps must be non-zero"));
        }
        if self.bands == 0 {
            return Err(PulseError::validation("bands must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(PulseError::validation("smoothing must be in [0, 1)"));
        }
        if !self.logo_pulse_amplitude.is_finite() || !self.logo_pulse_hz.is_finite() {
            return Err(PulseError::validation("logo pulse parameters must be finite"));
        }
        Ok(())
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Output frame rate.
    pub fn frame_rate(&self) -> PulseResult<Fps> {
        Fps::whole(self.fps)
    }

    /// Resolved preset, with the background override applied.
    pub fn resolved_preset(&self) -> Preset {
        let mut p = self.preset.preset();
        if let Some(bg) = self.background {
            p.background = bg;
        }
        p
    }
}

/// Built-in visual presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    /// Violet/magenta bars on a deep purple field.
    #[default]
    Neon,
    /// Cyan/blue bars on a midnight-blue field.
    Glowup,
}

impl PresetName {
    /// Preset chosen from an input file name (`glowup*` files get the glow-up look).
    pub fn for_file_name(name: &str) -> Self {
        if name.to_lowercase().starts_with("glowup") {
            Self::Glowup
        } else {
            Self::Neon
        }
    }

    /// Expand into the full preset bundle.
    pub fn preset(self) -> Preset {
        match self {
            Self::Neon => Preset {
                name: self,
                bar_from: Rgba8::rgb(255, 30, 255),
                bar_to: Rgba8::rgb(255, 150, 255),
                inner_radius: 230.0 / 1080.0,
                max_bar_len: 520.0 / 1080.0,
                background: Rgba8::rgb(0x0F, 0x00, 0x19),
                accent: Rgba8::rgb(0xFF, 0x00, 0x99),
            },
            Self::Glowup => Preset {
                name: self,
                bar_from: Rgba8::rgb(0, 230, 255),
                bar_to: Rgba8::rgb(40, 90, 255),
                inner_radius: 230.0 / 1080.0,
                max_bar_len: 520.0 / 1080.0,
                background: Rgba8::rgb(0x00, 0x19, 0x28),
                accent: Rgba8::rgb(0x00, 0xD9, 0xFF),
            },
        }
    }
}

impl std::str::FromStr for PresetName {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neon" => Ok(Self::Neon),
            "glowup" => Ok(Self::Glowup),
            other => Err(PulseError::validation(format!("unknown preset '{other}'"))),
        }
    }
}

/// Resolved preset values.
///
/// Radii are fractions of the canvas width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Preset {
    /// Preset identity.
    pub name: PresetName,
    /// Bar colour where `(sin(angle)+1)/2 == 0`.
    pub bar_from: Rgba8,
    /// Bar colour where `(sin(angle)+1)/2 == 1`.
    pub bar_to: Rgba8,
    /// Inner radius of the bar ring.
    pub inner_radius: f64,
    /// Length of a bar at full energy.
    pub max_bar_len: f64,
    /// Radial background centre colour (fades to black at the corners).
    pub background: Rgba8,
    /// Card borders, text shadows and the centre ring border.
    pub accent: Rgba8,
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
