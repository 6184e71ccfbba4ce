use std::path::{Path, PathBuf};

use crate::foundation::error::{PulseError, PulseResult};

/// An input audio file with its probed duration.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioAsset {
    /// Path to the audio file.
    pub path: PathBuf,
    /// Duration in seconds, `>= 0`. Zero when the container does not report one.
    pub duration_secs: f64,
}

/// Obtains the duration of an input audio file.
pub trait AudioProbe: Send + Sync {
    /// Probe `path`.
    ///
    /// Returns [`PulseError::AudioNotFound`] when `path` is not a file and
    /// [`PulseError::ProbeFailed`] when the inspector cannot read it.
    fn probe(&self, path: &Path) -> PulseResult<AudioAsset>;
}

/// [`AudioProbe`] backed by `ffprobe -show_format`.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    /// Probe with the given inspector executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl AudioProbe for FfprobeProbe {
    #[tracing::instrument(level = "debug", skip(self))]
    fn probe(&self, path: &Path) -> PulseResult<AudioAsset> {
        ensure_audio_file(path)?;

        let out = std::process::Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(std::process::Stdio::null())
            .output()
            .map_err(|e| {
                PulseError::probe_failed(format!(
                    "failed to run '{}': {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            return Err(PulseError::probe_failed(format!(
                "'{}' failed for '{}': {}",
                self.program.display(),
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let duration_secs = parse_probe_duration(&out.stdout)?;
        tracing::debug!(duration_secs, "probed audio");
        Ok(AudioAsset {
            path: path.to_path_buf(),
            duration_secs,
        })
    }
}

/// [`AudioProbe`] that reports a fixed duration for any existing file.
#[derive(Clone, Copy, Debug)]
pub struct FixedDurationProbe {
    duration_secs: f64,
}

impl FixedDurationProbe {
    /// Report `duration_secs` (clamped to `>= 0`).
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs: sanitize_duration(duration_secs),
        }
    }
}

impl AudioProbe for FixedDurationProbe {
    fn probe(&self, path: &Path) -> PulseResult<AudioAsset> {
        ensure_audio_file(path)?;
        Ok(AudioAsset {
            path: path.to_path_buf(),
            duration_secs: self.duration_secs,
        })
    }
}

fn ensure_audio_file(path: &Path) -> PulseResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PulseError::audio_not_found(path.display().to_string()))
    }
}

/// Extract `format.duration` from `ffprobe -print_format json` output.
///
/// A missing or unparsable duration yields `0.0`; malformed JSON is a probe failure.
pub(crate) fn parse_probe_duration(json: &[u8]) -> PulseResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| PulseError::probe_failed(format!("ffprobe json parse failed: {e}")))?;
    let secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    Ok(sanitize_duration(secs))
}

fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() { secs.max(0.0) } else { 0.0 }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/probe.rs"]
mod tests;
